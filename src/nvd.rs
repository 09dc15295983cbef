//! NVD API Client
//!
//! Bounded HTTP client for the National Vulnerability Database. The
//! destination URL is fixed at construction time and never derived from
//! caller input, so the configured API key can never be exfiltrated to an
//! attacker-chosen endpoint; caller data appears only in the query string.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::NvdConfig;
use crate::response::CallOutcome;
use crate::sanitize::CveId;

/// Hardcoded NVD CVE API endpoint
pub const NVD_BASE_URL: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";

/// Bounds on the caller-requested result count for keyword search
pub const MIN_RESULTS: u32 = 1;
pub const MAX_RESULTS: u32 = 50;

const RATE_LIMIT_MESSAGE: &str =
    "Rate limited by NVD API. Set NVD_API_KEY for higher limits (50 req/30s).";

/// Clamp a caller-requested result count into the accepted range.
pub fn clamp_results(requested: i64) -> u32 {
    requested.clamp(MIN_RESULTS as i64, MAX_RESULTS as i64) as u32
}

/// Flattened view of one NVD vulnerability object, keeping only the fields
/// useful to a caller triaging a finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CveReport {
    pub id: String,
    pub description: String,
    pub published: String,
    #[serde(rename = "lastModified")]
    pub last_modified: String,
    pub cvss: Value,
    pub cwes: Vec<String>,
    pub references: Vec<CveReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CveReference {
    pub url: String,
    pub source: String,
}

/// Search result envelope returned by the keyword-search tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchReport {
    #[serde(rename = "totalResults")]
    pub total_results: u64,
    pub returned: usize,
    pub vulnerabilities: Vec<CveReport>,
}

/// Client for the NVD CVE API
#[derive(Debug, Clone)]
pub struct NvdClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl NvdClient {
    /// Build a client from configuration. Fails only if the underlying HTTP
    /// client cannot be constructed.
    pub fn new(config: &NvdConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: NVD_BASE_URL.to_string(),
            api_key: config.api_key.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// Override the destination, for tests against a local stub server.
    /// This is a construction-time decision, never reachable from a request.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch details for one CVE.
    pub async fn get_cve(&self, cve_id: &CveId) -> CallOutcome {
        let outcome = self
            .query(&[("cveId", cve_id.as_str().to_string())])
            .await;
        let body = match outcome {
            CallOutcome::Success { payload, .. } => payload,
            other => return other,
        };

        let data: Value = match serde_json::from_str(&body) {
            Ok(data) => data,
            Err(err) => return parse_failure(err),
        };
        let Some(vuln) = data["vulnerabilities"].get(0) else {
            return CallOutcome::NotFound {
                message: format!("CVE {cve_id} not found"),
            };
        };

        let report = format_cve(vuln);
        success_payload(&report)
    }

    /// Search CVEs by keyword. `results` must already be clamped by the
    /// caller via [`clamp_results`].
    pub async fn search(&self, keyword: &str, results: u32) -> CallOutcome {
        let outcome = self
            .query(&[
                ("keywordSearch", keyword.to_string()),
                ("resultsPerPage", results.to_string()),
            ])
            .await;
        let body = match outcome {
            CallOutcome::Success { payload, .. } => payload,
            other => return other,
        };

        let data: Value = match serde_json::from_str(&body) {
            Ok(data) => data,
            Err(err) => return parse_failure(err),
        };
        let vulns: Vec<CveReport> = data["vulnerabilities"]
            .as_array()
            .map(|list| list.iter().map(format_cve).collect())
            .unwrap_or_default();
        let report = SearchReport {
            total_results: data["totalResults"].as_u64().unwrap_or(0),
            returned: vulns.len(),
            vulnerabilities: vulns,
        };
        success_payload(&report)
    }

    /// Issue one authenticated GET to the fixed endpoint and classify the
    /// result by status code.
    async fn query(&self, params: &[(&str, String)]) -> CallOutcome {
        debug!(params = params.len(), "querying NVD API");
        let mut request = self
            .http
            .get(&self.base_url)
            .header("Accept", "application/json")
            .query(params);
        if let Some(key) = &self.api_key {
            request = request.header("apiKey", key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                warn!(timeout_secs = self.timeout_secs, "NVD request timed out");
                return CallOutcome::Timeout {
                    operation: "NVD request",
                    seconds: self.timeout_secs,
                };
            }
            Err(err) => {
                warn!(error = %err, "NVD request failed");
                return CallOutcome::NetworkError {
                    message: format!("NVD request failed: {err}"),
                };
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::OK => CallOutcome::Success {
                payload: body,
                stderr: String::new(),
            },
            // NVD signals quota exhaustion with 403, not auth failure
            StatusCode::FORBIDDEN => CallOutcome::RateLimited {
                message: RATE_LIMIT_MESSAGE.to_string(),
            },
            other => CallOutcome::HttpFailure {
                service: "NVD API",
                status: other.as_u16(),
                body,
            },
        }
    }
}

fn success_payload<T: Serialize>(report: &T) -> CallOutcome {
    match serde_json::to_string_pretty(report) {
        Ok(payload) => CallOutcome::Success {
            payload,
            stderr: String::new(),
        },
        Err(err) => parse_failure(err),
    }
}

fn parse_failure(err: impl std::fmt::Display) -> CallOutcome {
    CallOutcome::NetworkError {
        message: format!("Failed to decode NVD response: {err}"),
    }
}

/// Extract the most useful fields from a raw NVD vulnerability object.
///
/// Prefers the English description, the newest CVSS metric version
/// (v3.1, then v3.0, then v2.0), and at most ten references.
pub fn format_cve(vuln: &Value) -> CveReport {
    let cve = &vuln["cve"];

    let descriptions = cve["descriptions"].as_array().cloned().unwrap_or_default();
    let description = descriptions
        .iter()
        .find(|d| d["lang"] == "en")
        .or_else(|| descriptions.first())
        .and_then(|d| d["value"].as_str())
        .unwrap_or("No description")
        .to_string();

    let metrics = &cve["metrics"];
    let mut cvss = Value::Object(Default::default());
    for version_key in ["cvssMetricV31", "cvssMetricV30", "cvssMetricV2"] {
        if let Some(metric) = metrics[version_key].get(0) {
            let data = &metric["cvssData"];
            cvss = serde_json::json!({
                "version": data["version"].as_str().unwrap_or(""),
                "baseScore": data["baseScore"],
                "baseSeverity": data["baseSeverity"]
                    .as_str()
                    .or_else(|| metric["baseSeverity"].as_str())
                    .unwrap_or(""),
                "vectorString": data["vectorString"].as_str().unwrap_or(""),
            });
            break;
        }
    }

    let cwes = cve["weaknesses"]
        .as_array()
        .map(|weaknesses| {
            weaknesses
                .iter()
                .flat_map(|w| w["description"].as_array().cloned().unwrap_or_default())
                .filter_map(|d| d["value"].as_str().map(str::to_string))
                .filter(|v| v.starts_with("CWE-"))
                .collect()
        })
        .unwrap_or_default();

    let references = cve["references"]
        .as_array()
        .map(|refs| {
            refs.iter()
                .take(10)
                .map(|r| CveReference {
                    url: r["url"].as_str().unwrap_or("").to_string(),
                    source: r["source"].as_str().unwrap_or("").to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    CveReport {
        id: cve["id"].as_str().unwrap_or("unknown").to_string(),
        description,
        published: cve["published"].as_str().unwrap_or("").to_string(),
        last_modified: cve["lastModified"].as_str().unwrap_or("").to_string(),
        cvss,
        cwes,
        references,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_vuln() -> Value {
        json!({
            "cve": {
                "id": "CVE-2024-1234",
                "published": "2024-02-01T00:00:00.000",
                "lastModified": "2024-03-01T00:00:00.000",
                "descriptions": [
                    { "lang": "es", "value": "Desbordamiento de búfer" },
                    { "lang": "en", "value": "Buffer overflow in example" }
                ],
                "metrics": {
                    "cvssMetricV2": [{
                        "cvssData": { "version": "2.0", "baseScore": 5.0, "vectorString": "AV:N" },
                        "baseSeverity": "MEDIUM"
                    }],
                    "cvssMetricV31": [{
                        "cvssData": {
                            "version": "3.1",
                            "baseScore": 9.8,
                            "baseSeverity": "CRITICAL",
                            "vectorString": "CVSS:3.1/AV:N"
                        }
                    }]
                },
                "weaknesses": [
                    { "description": [
                        { "lang": "en", "value": "CWE-120" },
                        { "lang": "en", "value": "NVD-CWE-Other" }
                    ]}
                ],
                "references": (0..15).map(|i| json!({
                    "url": format!("https://example.com/{i}"),
                    "source": "example"
                })).collect::<Vec<_>>()
            }
        })
    }

    #[test]
    fn test_format_cve_prefers_english_description() {
        let report = format_cve(&sample_vuln());
        assert_eq!(report.description, "Buffer overflow in example");
    }

    #[test]
    fn test_format_cve_prefers_cvss_v31() {
        let report = format_cve(&sample_vuln());
        assert_eq!(report.cvss["version"], "3.1");
        assert_eq!(report.cvss["baseScore"], json!(9.8));
        assert_eq!(report.cvss["baseSeverity"], "CRITICAL");
    }

    #[test]
    fn test_format_cve_falls_back_to_v2_severity_outside_cvss_data() {
        let mut vuln = sample_vuln();
        vuln["cve"]["metrics"]
            .as_object_mut()
            .unwrap()
            .remove("cvssMetricV31");
        let report = format_cve(&vuln);
        assert_eq!(report.cvss["version"], "2.0");
        assert_eq!(report.cvss["baseSeverity"], "MEDIUM");
    }

    #[test]
    fn test_format_cve_filters_non_cwe_weaknesses() {
        let report = format_cve(&sample_vuln());
        assert_eq!(report.cwes, vec!["CWE-120".to_string()]);
    }

    #[test]
    fn test_format_cve_caps_references_at_ten() {
        let report = format_cve(&sample_vuln());
        assert_eq!(report.references.len(), 10);
    }

    #[test]
    fn test_format_cve_handles_empty_object() {
        let report = format_cve(&json!({}));
        assert_eq!(report.id, "unknown");
        assert_eq!(report.description, "No description");
        assert!(report.cwes.is_empty());
        assert!(report.references.is_empty());
    }

    #[test]
    fn test_clamp_results() {
        assert_eq!(clamp_results(100), 50);
        assert_eq!(clamp_results(0), 1);
        assert_eq!(clamp_results(-5), 1);
        assert_eq!(clamp_results(10), 10);
    }

    #[test]
    fn test_report_serializes_with_wire_names() {
        let report = format_cve(&sample_vuln());
        let v = serde_json::to_value(&report).unwrap();
        assert!(v.get("lastModified").is_some());
        assert!(v.get("last_modified").is_none());
    }
}
