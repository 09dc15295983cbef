//! MCP Server and Tool Dispatch Surface
//!
//! Serves the MCP protocol over one JSON-RPC endpoint (`POST /mcp`) plus a
//! health probe. Every request passes the bearer auth gate first, then the
//! named tool runs its own sanitize → guard → invoke → normalize pipeline.
//! Requests are handled independently; the only shared state is the
//! read-only configuration and the clients built from it at startup.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::bearer_guard;
use crate::config::Config;
use crate::nvd::{clamp_results, NvdClient};
use crate::protocol::{
    tool_result, ResourceDescriptor, ResourceReadParams, RpcError, RpcRequest, RpcResponse,
    ToolCallParams, ToolDescriptor, JSONRPC_VERSION, PROTOCOL_VERSION,
};
use crate::response::ToolReply;
use crate::sanitize::{sanitize, CveId, SanitizeError, MAX_KEYWORD_LENGTH};
use crate::scanners::{GrypeScanner, LabRunner, SnykScanner, OS_RELEASE_URI};

/// Read-only per-process state shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub grype: GrypeScanner,
    pub snyk: SnykScanner,
    pub lab: LabRunner,
    pub nvd: NvdClient,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        Ok(Self {
            grype: GrypeScanner::new(&config.scan),
            snyk: SnykScanner::new(&config.scan),
            lab: LabRunner::new(&config.exec),
            nvd: NvdClient::new(&config.nvd).context("failed to build NVD client")?,
            config,
        })
    }
}

/// Build the axum application. The auth gate wraps every route, including
/// the health probe.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    Router::new()
        .route("/mcp", post(rpc_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(config, bearer_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process stops.
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.bind_addr();
    let state = AppState::new(Arc::new(config))?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("serving MCP on {addr}");
    axum::serve(listener, app).await.context("server error")
}

async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn rpc_handler(State(state): State<AppState>, body: String) -> Response {
    let request: RpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(err) => {
            let resp = RpcResponse::err(Value::Null, RpcError::parse_error(err.to_string()));
            return Json(resp).into_response();
        }
    };

    if request.jsonrpc != JSONRPC_VERSION {
        let error = RpcError::invalid_request(format!(
            "Unsupported jsonrpc version: {:?}",
            request.jsonrpc
        ));
        return Json(RpcResponse::err(request.id, error)).into_response();
    }

    // Notifications get no response body
    if request.id.is_null() {
        return StatusCode::ACCEPTED.into_response();
    }

    let id = request.id.clone();
    let result = handle_request(&state, request).await;
    let resp = match result {
        Ok(value) => RpcResponse::ok(id, value),
        Err(error) => RpcResponse::err(id, error),
    };
    Json(resp).into_response()
}

async fn handle_request(state: &AppState, request: RpcRequest) -> Result<Value, RpcError> {
    match request.method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {}, "resources": {} },
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        })),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": tool_descriptors() })),
        "tools/call" => {
            let params: ToolCallParams = parse_params(request.params)?;
            let reply = dispatch_tool(state, &params.name, &params.arguments)
                .await
                .ok_or_else(|| {
                    RpcError::invalid_params(format!("Unknown tool: {}", params.name))
                })?;
            Ok(tool_result(reply.text, reply.is_error))
        }
        "resources/list" => Ok(json!({ "resources": resource_descriptors() })),
        "resources/read" => {
            let params: ResourceReadParams = parse_params(request.params)?;
            if params.uri != OS_RELEASE_URI {
                return Err(RpcError::invalid_params(format!(
                    "Unknown resource: {}",
                    params.uri
                )));
            }
            let text = state
                .lab
                .os_release()
                .await
                .map_err(|err| RpcError::internal_error(err.to_string()))?;
            Ok(json!({
                "contents": [{
                    "uri": OS_RELEASE_URI,
                    "mimeType": "text/plain",
                    "text": text,
                }],
            }))
        }
        other => Err(RpcError::method_not_found(other)),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|err| RpcError::invalid_params(err.to_string()))
}

/// Route one tool call to its implementation. Returns `None` for an unknown
/// tool name; every known tool returns a [`ToolReply`], never an error.
pub async fn dispatch_tool(state: &AppState, name: &str, args: &Value) -> Option<ToolReply> {
    let reply = match name {
        "scan_image" => {
            state
                .grype
                .scan_image(str_arg(args, "image"), str_arg(args, "severity"))
                .await
        }
        "scan_dir" => state.grype.scan_dir(str_arg(args, "path")).await,
        "scan_sbom" => state.grype.scan_sbom(str_arg(args, "path")).await,
        "db_status" => state.grype.db_status().await,
        "db_update" => state.grype.db_update().await,
        "get_cve" => get_cve(state, str_arg(args, "cve_id")).await,
        "search_cves" => {
            search_cves(state, str_arg(args, "keyword"), int_arg(args, "results", 10)).await
        }
        "run_allowed" => {
            state
                .lab
                .run_allowed(str_arg(args, "cmd"), int_arg(args, "timeout_sec", 10))
                .await
        }
        "snyk_test" => {
            state
                .snyk
                .test(str_arg(args, "path"), str_arg(args, "package_manager"))
                .await
        }
        "snyk_code_test" => state.snyk.code_test(str_arg(args, "path")).await,
        "snyk_container_test" => state.snyk.container_test(str_arg(args, "image")).await,
        "snyk_iac_test" => state.snyk.iac_test(str_arg(args, "path")).await,
        "snyk_version" => state.snyk.version().await,
        "snyk_auth_status" => state.snyk.auth_status().await,
        _ => return None,
    };
    Some(reply)
}

async fn get_cve(state: &AppState, raw_id: &str) -> ToolReply {
    let cve_id = match CveId::parse(raw_id) {
        Ok(cve_id) => cve_id,
        Err(err) => return ToolReply::error(err),
    };
    ToolReply::from_outcome(state.nvd.get_cve(&cve_id).await)
}

async fn search_cves(state: &AppState, keyword: &str, results: i64) -> ToolReply {
    let keyword = sanitize(keyword, MAX_KEYWORD_LENGTH);
    if keyword.is_empty() {
        return ToolReply::error(SanitizeError::Empty("Keyword"));
    }
    ToolReply::from_outcome(state.nvd.search(&keyword, clamp_results(results)).await)
}

fn str_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or("")
}

fn int_arg(args: &Value, key: &str, default: i64) -> i64 {
    args.get(key).and_then(Value::as_i64).unwrap_or(default)
}

fn string_schema(properties: &[(&str, &str)], required: &[&str]) -> Value {
    let props: serde_json::Map<String, Value> = properties
        .iter()
        .map(|(name, desc)| {
            (
                name.to_string(),
                json!({ "type": "string", "description": desc }),
            )
        })
        .collect();
    json!({ "type": "object", "properties": props, "required": required })
}

fn tool_descriptors() -> Vec<ToolDescriptor> {
    let mut tools = vec![
        ToolDescriptor {
            name: "scan_image".to_string(),
            description: "Scan a container image for vulnerabilities with grype".to_string(),
            input_schema: string_schema(
                &[
                    ("image", "Container image reference, e.g. \"nginx:latest\""),
                    (
                        "severity",
                        "Minimum severity filter: negligible, low, medium, high, critical (optional)",
                    ),
                ],
                &["image"],
            ),
        },
        ToolDescriptor {
            name: "scan_dir".to_string(),
            description: "Scan a local directory for vulnerable dependencies".to_string(),
            input_schema: string_schema(&[("path", "Directory path to scan")], &["path"]),
        },
        ToolDescriptor {
            name: "scan_sbom".to_string(),
            description: "Scan an SBOM file (CycloneDX or SPDX) for known vulnerabilities"
                .to_string(),
            input_schema: string_schema(&[("path", "Path to the SBOM file")], &["path"]),
        },
        ToolDescriptor {
            name: "db_status".to_string(),
            description: "Check the status of the local grype vulnerability database".to_string(),
            input_schema: string_schema(&[], &[]),
        },
        ToolDescriptor {
            name: "db_update".to_string(),
            description: "Update the local grype vulnerability database".to_string(),
            input_schema: string_schema(&[], &[]),
        },
        ToolDescriptor {
            name: "get_cve".to_string(),
            description: "Fetch details for a specific CVE from the National Vulnerability Database"
                .to_string(),
            input_schema: string_schema(
                &[("cve_id", "CVE identifier, e.g. \"CVE-2024-1234\"")],
                &["cve_id"],
            ),
        },
        ToolDescriptor {
            name: "search_cves".to_string(),
            description: "Search the National Vulnerability Database by keyword".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "keyword": {
                        "type": "string",
                        "description": "Search term, e.g. \"apache log4j\"",
                    },
                    "results": {
                        "type": "integer",
                        "description": "Maximum number of results to return (1-50, default 10)",
                    },
                },
                "required": ["keyword"],
            }),
        },
        ToolDescriptor {
            name: "run_allowed".to_string(),
            description: "Run one allowlisted command inside the lab container".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "cmd": { "type": "string", "description": "Command line to run" },
                    "timeout_sec": {
                        "type": "integer",
                        "description": "Timeout in seconds (clamped to 1-30, default 10)",
                    },
                },
                "required": ["cmd"],
            }),
        },
        ToolDescriptor {
            name: "snyk_test".to_string(),
            description: "Run a Snyk open-source dependency scan (SCA) on a project".to_string(),
            input_schema: string_schema(
                &[
                    ("path", "Path to the project directory or manifest file"),
                    ("package_manager", "Package manager hint, e.g. npm, pip (optional)"),
                ],
                &["path"],
            ),
        },
        ToolDescriptor {
            name: "snyk_code_test".to_string(),
            description: "Run Snyk Code static analysis (SAST) on source code".to_string(),
            input_schema: string_schema(&[("path", "Path to the project directory")], &["path"]),
        },
        ToolDescriptor {
            name: "snyk_container_test".to_string(),
            description: "Scan a container image for known vulnerabilities with Snyk".to_string(),
            input_schema: string_schema(
                &[("image", "Container image reference, e.g. \"alpine:3.19\"")],
                &["image"],
            ),
        },
        ToolDescriptor {
            name: "snyk_iac_test".to_string(),
            description: "Scan Infrastructure as Code files for misconfigurations".to_string(),
            input_schema: string_schema(&[("path", "Path to IaC files")], &["path"]),
        },
        ToolDescriptor {
            name: "snyk_version".to_string(),
            description: "Get the installed Snyk CLI version".to_string(),
            input_schema: string_schema(&[], &[]),
        },
        ToolDescriptor {
            name: "snyk_auth_status".to_string(),
            description: "Check Snyk authentication status".to_string(),
            input_schema: string_schema(&[], &[]),
        },
    ];
    tools.sort_by(|a, b| a.name.cmp(&b.name));
    tools
}

fn resource_descriptors() -> Vec<ResourceDescriptor> {
    vec![ResourceDescriptor {
        uri: OS_RELEASE_URI.to_string(),
        name: "os-release".to_string(),
        mime_type: "text/plain".to_string(),
    }]
}
