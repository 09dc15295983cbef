// NVD client tests against a local stub server: status-code classification
// and the flattened report payloads.

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};

use vulnscan_mcp::config::NvdConfig;
use vulnscan_mcp::nvd::NvdClient;
use vulnscan_mcp::response::{normalize, CallOutcome};
use vulnscan_mcp::sanitize::CveId;

async fn spawn_stub(status: StatusCode, body: Value) -> String {
    let app = Router::new().route(
        "/",
        get(move || {
            let body = body.to_string();
            async move { (status, body) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

fn client(base_url: String) -> NvdClient {
    NvdClient::new(&NvdConfig::default())
        .unwrap()
        .with_base_url(base_url)
}

fn cve(raw: &str) -> CveId {
    CveId::parse(raw).unwrap()
}

#[tokio::test]
async fn status_403_classifies_as_rate_limited() {
    let base = spawn_stub(StatusCode::FORBIDDEN, json!({})).await;
    let outcome = client(base).get_cve(&cve("CVE-2024-0001")).await;
    assert!(matches!(outcome, CallOutcome::RateLimited { .. }));
    let text = normalize(outcome);
    assert!(text.contains("Rate limited by NVD API"));
    assert!(text.contains("NVD_API_KEY"));
}

#[tokio::test]
async fn other_non_200_carries_status_and_body() {
    let base = spawn_stub(StatusCode::INTERNAL_SERVER_ERROR, json!("oops")).await;
    let outcome = client(base).get_cve(&cve("CVE-2024-0001")).await;
    match &outcome {
        CallOutcome::HttpFailure { status, .. } => assert_eq!(*status, 500),
        other => panic!("expected http failure, got {other:?}"),
    }
    let body: Value = serde_json::from_str(&normalize(outcome)).unwrap();
    assert_eq!(body["error"], "NVD API returned HTTP 500");
}

#[tokio::test]
async fn empty_vulnerability_list_is_not_found() {
    let base = spawn_stub(StatusCode::OK, json!({ "vulnerabilities": [] })).await;
    let outcome = client(base).get_cve(&cve("cve-2024-0001")).await;
    match outcome {
        CallOutcome::NotFound { message } => {
            assert_eq!(message, "CVE CVE-2024-0001 not found");
        }
        other => panic!("expected not found, got {other:?}"),
    }
}

#[tokio::test]
async fn get_cve_returns_flattened_report() {
    let base = spawn_stub(
        StatusCode::OK,
        json!({
            "vulnerabilities": [{
                "cve": {
                    "id": "CVE-2024-0001",
                    "published": "2024-01-01T00:00:00.000",
                    "lastModified": "2024-01-02T00:00:00.000",
                    "descriptions": [{ "lang": "en", "value": "An example flaw" }],
                    "metrics": {},
                    "weaknesses": [],
                    "references": []
                }
            }]
        }),
    )
    .await;
    let outcome = client(base).get_cve(&cve("CVE-2024-0001")).await;
    assert!(outcome.is_success());
    let report: Value = serde_json::from_str(&normalize(outcome)).unwrap();
    assert_eq!(report["id"], "CVE-2024-0001");
    assert_eq!(report["description"], "An example flaw");
}

#[tokio::test]
async fn search_wraps_results_in_envelope() {
    let base = spawn_stub(
        StatusCode::OK,
        json!({
            "totalResults": 2,
            "vulnerabilities": [
                { "cve": { "id": "CVE-2024-0001" } },
                { "cve": { "id": "CVE-2024-0002" } }
            ]
        }),
    )
    .await;
    let outcome = client(base).search("apache", 10).await;
    let report: Value = serde_json::from_str(&normalize(outcome)).unwrap();
    assert_eq!(report["totalResults"], 2);
    assert_eq!(report["returned"], 2);
    assert_eq!(report["vulnerabilities"][1]["id"], "CVE-2024-0002");
}

#[tokio::test]
async fn connection_refused_is_a_network_error_not_a_crash() {
    // Nothing listens on this port
    let outcome = client("http://127.0.0.1:1/".to_string())
        .get_cve(&cve("CVE-2024-0001"))
        .await;
    match outcome {
        CallOutcome::NetworkError { message } => {
            assert!(message.contains("NVD request failed"));
        }
        other => panic!("expected network error, got {other:?}"),
    }
}
