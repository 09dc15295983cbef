// Configuration
//
// Immutable process-wide configuration, built once at startup from
// environment variables and passed by Arc into every request handler.
// Defaults follow the hardened profile: loopback bind, auth enforced
// whenever a token is configured.

use std::collections::HashMap;
use std::env;

use serde::{Deserialize, Serialize};

use crate::exec::DEFAULT_ALLOWED_COMMANDS;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Inbound HTTP server configuration
    pub server: ServerConfig,

    /// Bearer auth gate configuration
    pub auth: AuthConfig,

    /// NVD API client configuration
    pub nvd: NvdConfig,

    /// Scanner subprocess configuration (grype, snyk)
    pub scan: ScanConfig,

    /// Allowlisted command runner configuration
    pub exec: ExecConfig,
}

/// Inbound HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host (default loopback; set MCP_HOST=0.0.0.0 to expose)
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Bearer auth gate configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret; `None` disables the gate entirely
    pub token: Option<String>,
}

impl AuthConfig {
    pub fn enabled(&self) -> bool {
        self.token.is_some()
    }
}

/// NVD API client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NvdConfig {
    /// Optional API key for higher rate limits; never caller-visible
    pub api_key: Option<String>,

    /// Outbound request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for NvdConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            request_timeout_secs: 30,
        }
    }
}

/// Scanner subprocess configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    /// Wall-clock bound for image/dir/sbom scans in seconds
    pub scan_timeout_secs: u64,

    /// Wall-clock bound for `db status` in seconds
    pub db_status_timeout_secs: u64,

    /// Wall-clock bound for `db update` in seconds
    pub db_update_timeout_secs: u64,

    /// Snyk auth token, passed to `snyk auth`; never caller-settable
    pub snyk_token: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_timeout_secs: 120,
            db_status_timeout_secs: 30,
            db_update_timeout_secs: 60,
            snyk_token: None,
        }
    }
}

/// Allowlisted command runner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecConfig {
    /// Comma-separated allowed commands; `all` disables the allowlist
    pub allowed_commands: String,

    /// Upper clamp on the caller-requested timeout in seconds
    pub max_timeout_secs: u64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            allowed_commands: DEFAULT_ALLOWED_COMMANDS.to_string(),
            max_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Self {
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build configuration from an explicit variable map (testable form of
    /// [`Config::from_env`]). Unset or empty variables keep their defaults;
    /// an empty `MCP_AUTH_TOKEN` means auth disabled.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = non_empty(vars, "MCP_HOST") {
            config.server.host = host;
        }
        if let Some(port) = non_empty(vars, "MCP_PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }
        config.auth.token = non_empty(vars, "MCP_AUTH_TOKEN");
        config.nvd.api_key = non_empty(vars, "NVD_API_KEY");
        config.scan.snyk_token = non_empty(vars, "SNYK_TOKEN");
        if let Some(commands) = non_empty(vars, "ALLOWED_COMMANDS") {
            config.exec.allowed_commands = commands;
        }

        config
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn non_empty(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key).map(String::as_str).and_then(|v| {
        if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    })
}
