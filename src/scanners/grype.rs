//! Grype Scanner Façade
//!
//! Container image, directory, and SBOM vulnerability scanning plus local
//! database maintenance. Grype exits 1 when `--fail-on` matches, so both 0
//! and 1 count as a completed scan.

use std::time::Duration;

use crate::config::ScanConfig;
use crate::exec::{run, Invocation};
use crate::response::ToolReply;
use crate::sanitize::{sanitize, SanitizeError, Severity, MAX_ARG_LENGTH};

const PROGRAM: &str = "grype";
const OK_CODES: &[i32] = &[0, 1];

/// Façade over the grype CLI
#[derive(Debug, Clone)]
pub struct GrypeScanner {
    scan_timeout: Duration,
    db_status_timeout: Duration,
    db_update_timeout: Duration,
}

impl GrypeScanner {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            scan_timeout: Duration::from_secs(config.scan_timeout_secs),
            db_status_timeout: Duration::from_secs(config.db_status_timeout_secs),
            db_update_timeout: Duration::from_secs(config.db_update_timeout_secs),
        }
    }

    /// Scan a container image, optionally filtering by minimum severity.
    pub async fn scan_image(&self, image: &str, severity: &str) -> ToolReply {
        let image = match required(image, "image") {
            Ok(image) => image,
            Err(err) => return ToolReply::error(err),
        };
        let mut args = vec![image, "-o".to_string(), "json".to_string()];
        let severity = sanitize(severity, MAX_ARG_LENGTH);
        if !severity.is_empty() {
            let level: Severity = match severity.parse() {
                Ok(level) => level,
                Err(err) => return ToolReply::error(err),
            };
            args.push("--fail-on".to_string());
            args.push(level.as_str().to_string());
        }
        self.invoke(args, self.scan_timeout).await
    }

    /// Scan a local directory for vulnerable dependencies.
    pub async fn scan_dir(&self, path: &str) -> ToolReply {
        let path = match required(path, "path") {
            Ok(path) => path,
            Err(err) => return ToolReply::error(err),
        };
        self.invoke(
            vec![format!("dir:{path}"), "-o".to_string(), "json".to_string()],
            self.scan_timeout,
        )
        .await
    }

    /// Scan an SBOM file (CycloneDX or SPDX) for known vulnerabilities.
    pub async fn scan_sbom(&self, path: &str) -> ToolReply {
        let path = match required(path, "path") {
            Ok(path) => path,
            Err(err) => return ToolReply::error(err),
        };
        self.invoke(
            vec![format!("sbom:{path}"), "-o".to_string(), "json".to_string()],
            self.scan_timeout,
        )
        .await
    }

    /// Report the status of the local vulnerability database.
    pub async fn db_status(&self) -> ToolReply {
        self.invoke(argv(&["db", "status", "-o", "json"]), self.db_status_timeout)
            .await
    }

    /// Update the local vulnerability database.
    pub async fn db_update(&self) -> ToolReply {
        self.invoke(argv(&["db", "update", "-o", "json"]), self.db_update_timeout)
            .await
    }

    async fn invoke(&self, args: Vec<String>, timeout: Duration) -> ToolReply {
        let mut inv = Invocation::new(PROGRAM, args, timeout);
        inv.ok_codes = OK_CODES;
        inv.operation = "Scan";
        ToolReply::from_outcome(run(inv).await)
    }
}

fn required(raw: &str, field: &'static str) -> Result<String, SanitizeError> {
    let cleaned = sanitize(raw, MAX_ARG_LENGTH);
    if cleaned.is_empty() {
        Err(SanitizeError::Empty(field))
    } else {
        Ok(cleaned)
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn scanner() -> GrypeScanner {
        GrypeScanner::new(&ScanConfig::default())
    }

    fn parse(reply: &ToolReply) -> Value {
        serde_json::from_str(&reply.text).unwrap()
    }

    #[tokio::test]
    async fn test_scan_image_rejects_empty_image() {
        let reply = scanner().scan_image("  \x00 ", "").await;
        assert!(reply.is_error);
        assert_eq!(parse(&reply)["error"], "image must not be empty after sanitization");
    }

    #[tokio::test]
    async fn test_scan_image_rejects_invalid_severity() {
        let reply = scanner().scan_image("alpine:3.19", "extreme").await;
        assert!(reply.is_error);
        let msg = parse(&reply)["error"].as_str().unwrap().to_string();
        assert!(msg.contains("negligible, low, medium, high, critical"));
    }

    #[tokio::test]
    async fn test_scan_dir_rejects_empty_path() {
        let reply = scanner().scan_dir("").await;
        assert!(reply.is_error);
    }

    // With grype absent from the test host, invocation surfaces the fixed
    // missing-binary message rather than a crash.
    #[tokio::test]
    async fn test_missing_binary_is_normalized() {
        let reply = scanner().db_status().await;
        if reply.is_error {
            let v = parse(&reply);
            assert!(v["error"].as_str().unwrap().contains("grype"));
        }
    }
}
