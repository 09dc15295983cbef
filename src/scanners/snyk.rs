//! Snyk Scanner Façade
//!
//! SCA, SAST, container, and IaC scanning through the snyk CLI. Snyk exit
//! codes: 0 = no vulnerabilities, 1 = vulnerabilities found, 2 = failure,
//! 3 = no supported projects; 0 and 1 are both completed scans. Failure
//! diagnostics carry a stdout tail as well, since snyk reports some errors
//! there.

use std::time::Duration;

use crate::config::ScanConfig;
use crate::exec::{run, Invocation};
use crate::response::ToolReply;
use crate::sanitize::{sanitize, SanitizeError, MAX_ARG_LENGTH};

const PROGRAM: &str = "snyk";
const OK_CODES: &[i32] = &[0, 1];

const VERSION_TIMEOUT: Duration = Duration::from_secs(10);
const AUTH_TIMEOUT: Duration = Duration::from_secs(15);

/// Façade over the snyk CLI
#[derive(Debug, Clone)]
pub struct SnykScanner {
    scan_timeout: Duration,
    token: Option<String>,
}

impl SnykScanner {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            scan_timeout: Duration::from_secs(config.scan_timeout_secs),
            token: config.snyk_token.clone(),
        }
    }

    /// Open-source dependency scan (SCA) with an optional package-manager hint.
    pub async fn test(&self, path: &str, package_manager: &str) -> ToolReply {
        let path = match required(path, "path") {
            Ok(path) => path,
            Err(err) => return ToolReply::error(err),
        };
        let mut args = vec!["test".to_string(), path, "--json".to_string()];
        let manager = sanitize(package_manager, MAX_ARG_LENGTH);
        if !manager.is_empty() {
            args.push("--package-manager".to_string());
            args.push(manager);
        }
        self.invoke(args, self.scan_timeout).await
    }

    /// Static analysis (SAST) of source code.
    pub async fn code_test(&self, path: &str) -> ToolReply {
        let path = match required(path, "path") {
            Ok(path) => path,
            Err(err) => return ToolReply::error(err),
        };
        self.invoke(
            vec!["code".to_string(), "test".to_string(), path, "--json".to_string()],
            self.scan_timeout,
        )
        .await
    }

    /// Container image scan.
    pub async fn container_test(&self, image: &str) -> ToolReply {
        let image = match required(image, "image") {
            Ok(image) => image,
            Err(err) => return ToolReply::error(err),
        };
        self.invoke(
            vec![
                "container".to_string(),
                "test".to_string(),
                image,
                "--json".to_string(),
            ],
            self.scan_timeout,
        )
        .await
    }

    /// Infrastructure-as-Code misconfiguration scan.
    pub async fn iac_test(&self, path: &str) -> ToolReply {
        let path = match required(path, "path") {
            Ok(path) => path,
            Err(err) => return ToolReply::error(err),
        };
        self.invoke(
            vec!["iac".to_string(), "test".to_string(), path, "--json".to_string()],
            self.scan_timeout,
        )
        .await
    }

    /// Installed CLI version.
    pub async fn version(&self) -> ToolReply {
        self.invoke(vec!["version".to_string()], VERSION_TIMEOUT)
            .await
    }

    /// Authentication status, using the server-side token; the caller never
    /// supplies or sees the credential.
    pub async fn auth_status(&self) -> ToolReply {
        let token = self.token.clone().unwrap_or_default();
        self.invoke(
            vec![
                "auth".to_string(),
                "--token".to_string(),
                token,
                "--json".to_string(),
            ],
            AUTH_TIMEOUT,
        )
        .await
    }

    async fn invoke(&self, args: Vec<String>, timeout: Duration) -> ToolReply {
        let mut inv = Invocation::new(PROGRAM, args, timeout);
        inv.ok_codes = OK_CODES;
        inv.operation = "Scan";
        inv.stdout_on_failure = true;
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn scanner() -> SnykScanner {
        SnykScanner::new(&ScanConfig::default())
    }

    fn parse(reply: &ToolReply) -> Value {
        serde_json::from_str(&reply.text).unwrap()
    }

    #[tokio::test]
    async fn test_test_rejects_empty_path() {
        let reply = scanner().test("\x1f\x1f", "").await;
        assert!(reply.is_error);
        assert_eq!(parse(&reply)["error"], "path must not be empty after sanitization");
    }

    #[tokio::test]
    async fn test_container_test_rejects_empty_image() {
        let reply = scanner().container_test("   ").await;
        assert!(reply.is_error);
    }

    #[tokio::test]
    async fn test_missing_binary_is_normalized() {
        let reply = scanner().version().await;
        if reply.is_error {
            let v = parse(&reply);
            assert!(v["error"].as_str().unwrap().contains("snyk"));
        }
    }
}
