//! External Call Outcomes and Response Normalization
//!
//! Every external call (subprocess or NVD HTTP request) produces a
//! [`CallOutcome`] rather than a raw untyped payload. [`normalize`] maps each
//! variant to exactly one JSON-object-shaped string with a stable error
//! shape, bounding all diagnostic fields so responses cannot grow without
//! limit. Normalization never fails; every variant has a defined output.

use serde_json::json;

/// Bound on stderr tails included in diagnostics
pub const STDERR_TAIL: usize = 2000;

/// Bound on stdout tails included in failure diagnostics
pub const STDOUT_TAIL: usize = 2000;

/// Bound on HTTP response body prefixes included in diagnostics
pub const BODY_HEAD: usize = 500;

/// Classified result of one bounded external call.
///
/// Produced fresh per call, never cached or shared. The classification is
/// decided by the component that made the call (exit-code set for
/// subprocesses, status code for HTTP) and is the only thing the normalizer
/// looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call succeeded; `payload` is the tool's own output (usually JSON)
    Success { payload: String, stderr: String },

    /// The upstream API refused the request due to quota exhaustion
    RateLimited { message: String },

    /// The call succeeded but no matching record exists
    NotFound { message: String },

    /// The external program exited with a code outside its accepted set
    ExitFailure {
        program: String,
        code: i32,
        stderr: String,
        stdout: Option<String>,
    },

    /// The upstream API returned an unexpected HTTP status
    HttpFailure {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The external program could not be found on this host
    MissingBinary { program: String },

    /// The call exceeded its wall-clock bound
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    /// Connection-level failure talking to the upstream API
    NetworkError { message: String },
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Map a [`CallOutcome`] to a single JSON-shaped response string.
///
/// Success with a non-empty payload passes the payload through verbatim;
/// everything else becomes an object with at minimum an `error` key (or a
/// `message` key for the empty-success case).
pub fn normalize(outcome: CallOutcome) -> String {
    match outcome {
        CallOutcome::Success { payload, stderr } => {
            if payload.is_empty() {
                json!({ "message": "No output", "stderr": tail(&stderr, STDERR_TAIL) })
                    .to_string()
            } else {
                payload
            }
        }
        CallOutcome::RateLimited { message } | CallOutcome::NotFound { message } => {
            json!({ "error": message }).to_string()
        }
        CallOutcome::ExitFailure {
            program,
            code,
            stderr,
            stdout,
        } => {
            let mut body = json!({
                "error": format!("{program} exited with code {code}"),
                "stderr": tail(&stderr, STDERR_TAIL),
            });
            if let Some(out) = stdout {
                body["stdout"] = json!(tail(&out, STDOUT_TAIL));
            }
            body.to_string()
        }
        CallOutcome::HttpFailure {
            service,
            status,
            body,
        } => json!({
            "error": format!("{service} returned HTTP {status}"),
            "body": head(&body, BODY_HEAD),
        })
        .to_string(),
        CallOutcome::MissingBinary { program } => {
            json!({ "error": format!("{program} binary not found") }).to_string()
        }
        CallOutcome::Timeout { operation, seconds } => {
            json!({ "error": format!("{operation} timed out after {seconds}s") }).to_string()
        }
        CallOutcome::NetworkError { message } => json!({ "error": message }).to_string(),
    }
}

/// Final reply of one tool invocation: the normalized JSON-shaped string
/// plus whether it represents a failure (for the MCP `isError` flag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReply {
    pub text: String,
    pub is_error: bool,
}

impl ToolReply {
    /// Normalize a call outcome into a reply
    pub fn from_outcome(outcome: CallOutcome) -> Self {
        let is_error = !outcome.is_success();
        Self {
            text: normalize(outcome),
            is_error,
        }
    }

    /// A successful reply with an already-JSON-shaped body
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    /// An error reply with the stable `{"error": ...}` shape
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            text: json!({ "error": message.to_string() }).to_string(),
            is_error: true,
        }
    }
}

/// Last `max` characters of a string (char-boundary safe)
pub fn tail(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        s.to_string()
    } else {
        s.chars().skip(count - max).collect()
    }
}

/// First `max` characters of a string (char-boundary safe)
pub fn head(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
