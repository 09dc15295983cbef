//! Bounded External Process Invoker
//!
//! Runs one external program per call with a wall-clock timeout. The
//! argument vector is handed directly to `tokio::process::Command`; nothing
//! is ever concatenated into a shell string. No process handle survives the
//! call.
//!
//! [`run_raw`] reports what happened (exit code, timeout, missing binary);
//! [`run`] layers the tool-specific exit-code classification on top. The
//! command runner uses the raw form because it reports any exit code to the
//! caller instead of classifying it.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::response::CallOutcome;

/// Uninterpreted result of one subprocess run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOutcome {
    /// The process ran to completion with this exit code (signal-terminated
    /// processes report -1)
    Completed {
        code: i32,
        stdout: String,
        stderr: String,
    },

    /// The wall-clock bound expired; the child was killed, output dropped
    Timeout { seconds: u64 },

    /// The program does not exist on this host
    MissingBinary,

    /// Spawn or output collection failed at the OS level
    Failed(String),
}

/// One bounded, classified subprocess invocation.
///
/// `ok_codes` is the tool-specific set of success-like exit codes (e.g.
/// `{0, 1}` for scanners where 1 means "vulnerabilities found, scan itself
/// succeeded"). `operation` names the call in timeout messages ("Scan",
/// "Command"). `stdout_on_failure` controls whether a bounded stdout tail is
/// attached to exit-failure diagnostics.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub program: &'a str,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub ok_codes: &'a [i32],
    pub operation: &'static str,
    pub stdout_on_failure: bool,
}

impl<'a> Invocation<'a> {
    pub fn new(program: &'a str, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program,
            args,
            timeout,
            ok_codes: &[0],
            operation: "Command",
            stdout_on_failure: false,
        }
    }
}

/// Execute a program with arguments under a timeout, without interpreting
/// the exit code.
pub async fn run_raw(program: &str, args: &[String], limit: Duration) -> RawOutcome {
    info!(program, args = args.len(), "executing external program");

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(program, "binary not found");
            return RawOutcome::MissingBinary;
        }
        Err(err) => {
            warn!(program, error = %err, "failed to spawn");
            return RawOutcome::Failed(format!("failed to spawn: {err}"));
        }
    };

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            warn!(program, error = %err, "failed to collect output");
            return RawOutcome::Failed(format!("failed to collect output: {err}"));
        }
        Err(_) => {
            // Dropping the future kills the child via kill_on_drop
            warn!(program, timeout_secs = limit.as_secs(), "timed out");
            return RawOutcome::Timeout {
                seconds: limit.as_secs(),
            };
        }
    };

    RawOutcome::Completed {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

/// Execute an [`Invocation`] and classify the result by exit code.
///
/// Never returns a raw error: spawn failure, timeout, and non-success exit
/// codes all map to a [`CallOutcome`] variant.
pub async fn run(inv: Invocation<'_>) -> CallOutcome {
    match run_raw(inv.program, &inv.args, inv.timeout).await {
        RawOutcome::Completed {
            code,
            stdout,
            stderr,
        } => {
            if inv.ok_codes.contains(&code) {
                debug!(program = inv.program, code, "external program succeeded");
                CallOutcome::Success {
                    payload: stdout,
                    stderr,
                }
            } else {
                warn!(program = inv.program, code, "external program failed");
                CallOutcome::ExitFailure {
                    program: inv.program.to_string(),
                    code,
                    stderr,
                    stdout: inv.stdout_on_failure.then_some(stdout),
                }
            }
        }
        RawOutcome::Timeout { seconds } => CallOutcome::Timeout {
            operation: inv.operation,
            seconds,
        },
        RawOutcome::MissingBinary => CallOutcome::MissingBinary {
            program: inv.program.to_string(),
        },
        RawOutcome::Failed(message) => CallOutcome::ExitFailure {
            program: inv.program.to_string(),
            code: -1,
            stderr: message,
            stdout: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_run_echo_succeeds() {
        let inv = Invocation::new("echo", args(&["hello"]), Duration::from_secs(5));
        match run(inv).await {
            CallOutcome::Success { payload, .. } => assert!(payload.contains("hello")),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure_by_default() {
        let inv = Invocation::new("false", vec![], Duration::from_secs(5));
        match run(inv).await {
            CallOutcome::ExitFailure { code, .. } => assert_eq!(code, 1),
            other => panic!("expected exit failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ok_codes_accept_exit_one() {
        let mut inv = Invocation::new("false", vec![], Duration::from_secs(5));
        inv.ok_codes = &[0, 1];
        assert!(run(inv).await.is_success());
    }

    #[tokio::test]
    async fn test_timeout_classification() {
        let mut inv = Invocation::new("sleep", args(&["10"]), Duration::from_secs(1));
        inv.operation = "Scan";
        match run(inv).await {
            CallOutcome::Timeout { operation, seconds } => {
                assert_eq!(operation, "Scan");
                assert_eq!(seconds, 1);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_classification() {
        let inv = Invocation::new(
            "definitely-not-a-real-binary-xyz",
            vec![],
            Duration::from_secs(5),
        );
        match run(inv).await {
            CallOutcome::MissingBinary { program } => {
                assert_eq!(program, "definitely-not-a-real-binary-xyz");
            }
            other => panic!("expected missing binary, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_raw_outcome_reports_any_exit_code() {
        let raw = run_raw("sh", &args(&["-c", "exit 42"]), Duration::from_secs(5)).await;
        match raw {
            RawOutcome::Completed { code, .. } => assert_eq!(code, 42),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stdout_attached_on_failure_when_requested() {
        let mut inv = Invocation::new(
            "sh",
            args(&["-c", "echo partial; exit 2"]),
            Duration::from_secs(5),
        );
        inv.stdout_on_failure = true;
        match run(inv).await {
            CallOutcome::ExitFailure { stdout, .. } => {
                assert!(stdout.unwrap().contains("partial"));
            }
            other => panic!("expected exit failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_argv_is_not_shell_interpreted() {
        // Metacharacters arrive as literal arguments
        let inv = Invocation::new("echo", args(&["$(whoami)", ";", "ls"]), Duration::from_secs(5));
        match run(inv).await {
            CallOutcome::Success { payload, .. } => {
                assert!(payload.contains("$(whoami)"));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }
}
