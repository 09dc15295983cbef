//! Allowlisted Command Runner
//!
//! Runs one caller-named command inside the lab container, guarded by the
//! configured allowlist. The command line is split with POSIX word-splitting
//! rules and the resulting argv is executed directly; it is never
//! reassembled into a shell string. Any exit code counts as a completed run
//! and is reported to the caller alongside bounded output tails.
//!
//! Also serves the `lab://os-release` resource, a verbatim read of the
//! host's OS release metadata.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;

use crate::config::ExecConfig;
use crate::exec::{run_raw, tokenize, CommandAllowlist, RawOutcome};
use crate::response::{tail, CallOutcome, ToolReply, STDERR_TAIL};
use crate::sanitize::{sanitize, MAX_COMMAND_LENGTH};

/// Resource URI for the OS release metadata
pub const OS_RELEASE_URI: &str = "lab://os-release";

const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Caller-requested timeouts clamp to at least one second
const MIN_TIMEOUT_SECS: u64 = 1;

/// Bound on the stdout tail reported for a completed run
const RUN_STDOUT_TAIL: usize = 6000;

/// Allowlisted command runner
#[derive(Debug, Clone)]
pub struct LabRunner {
    allowlist: CommandAllowlist,
    max_timeout_secs: u64,
}

impl LabRunner {
    pub fn new(config: &ExecConfig) -> Self {
        Self {
            allowlist: CommandAllowlist::from_spec(&config.allowed_commands),
            max_timeout_secs: config.max_timeout_secs,
        }
    }

    pub fn allowlist(&self) -> &CommandAllowlist {
        &self.allowlist
    }

    /// Run one allowlisted command with a caller-requested timeout, clamped
    /// to `1..=max_timeout_secs`.
    pub async fn run_allowed(&self, cmd: &str, timeout_sec: i64) -> ToolReply {
        let cleaned = sanitize(cmd, MAX_COMMAND_LENGTH);
        let Some(argv) = tokenize(&cleaned) else {
            return ToolReply::error("Invalid command syntax");
        };
        if argv.is_empty() {
            return ToolReply::error("Empty command.");
        }
        if !self.allowlist.is_allowed(&argv) {
            return ToolReply::error(format!(
                "Blocked. Allowed commands: {}",
                self.allowlist.display()
            ));
        }

        // A configured maximum below one second still clamps to one second
        let max = self.max_timeout_secs.max(MIN_TIMEOUT_SECS);
        let seconds = timeout_sec.clamp(MIN_TIMEOUT_SECS as i64, max as i64);
        let limit = Duration::from_secs(seconds as u64);

        match run_raw(&argv[0], &argv[1..], limit).await {
            RawOutcome::Completed {
                code,
                stdout,
                stderr,
            } => ToolReply::ok(
                json!({
                    "exit": code,
                    "stdout": tail(&stdout, RUN_STDOUT_TAIL),
                    "stderr": tail(&stderr, STDERR_TAIL),
                })
                .to_string(),
            ),
            RawOutcome::Timeout { seconds } => ToolReply::from_outcome(CallOutcome::Timeout {
                operation: "Command",
                seconds,
            }),
            RawOutcome::MissingBinary => ToolReply::from_outcome(CallOutcome::MissingBinary {
                program: argv[0].clone(),
            }),
            RawOutcome::Failed(message) => ToolReply::from_outcome(CallOutcome::ExitFailure {
                program: argv[0].clone(),
                code: -1,
                stderr: message,
                stdout: None,
            }),
        }
    }

    /// Return OS metadata from `/etc/os-release`, verbatim.
    pub async fn os_release(&self) -> anyhow::Result<String> {
        read_os_release(OS_RELEASE_PATH).await
    }
}

async fn read_os_release(path: impl AsRef<Path>) -> anyhow::Result<String> {
    let path = path.as_ref();
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}
