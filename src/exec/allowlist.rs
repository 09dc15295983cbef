//! Command Allowlist Guard
//!
//! Decides whether the leading token of a caller-supplied command line may
//! execute. This is a flat textual check on the executable name, initialized
//! once at startup and immutable thereafter; it does not inspect arguments
//! or resolve paths. Argument-level safety comes from the invoker executing
//! argv directly with no shell.

use std::collections::BTreeSet;

/// Default allowed commands when `ALLOWED_COMMANDS` is unset
pub const DEFAULT_ALLOWED_COMMANDS: &str = "whoami,id,uname,ip,df,free,ps,ss,ls,cat";

/// Case-insensitive sentinel that disables the allowlist entirely
const ALLOW_ALL_SENTINEL: &str = "all";

/// Split a raw command line into an argument vector using POSIX shell
/// word-splitting rules. Returns `None` on malformed quoting.
pub fn tokenize(cmd: &str) -> Option<Vec<String>> {
    shlex::split(cmd)
}

/// Set of executable names permitted by the `run_allowed` tool
#[derive(Debug, Clone)]
pub struct CommandAllowlist {
    commands: BTreeSet<String>,
    allow_all: bool,
}

impl Default for CommandAllowlist {
    fn default() -> Self {
        Self::from_spec(DEFAULT_ALLOWED_COMMANDS)
    }
}

impl CommandAllowlist {
    /// Build an allowlist from a comma-separated spec.
    ///
    /// Entries are trimmed; empty entries are ignored. If any entry equals
    /// `all` (case-insensitive) the allowlist permits every non-empty
    /// command.
    pub fn from_spec(spec: &str) -> Self {
        let commands: BTreeSet<String> = spec
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let allow_all = commands
            .iter()
            .any(|c| c.eq_ignore_ascii_case(ALLOW_ALL_SENTINEL));
        Self {
            commands,
            allow_all,
        }
    }

    /// Whether the given argument vector's leading token may execute.
    ///
    /// An empty vector is never allowed, even under the allow-all override.
    pub fn is_allowed(&self, argv: &[String]) -> bool {
        let Some(first) = argv.first() else {
            return false;
        };
        self.allow_all || self.commands.contains(first)
    }

    pub fn allow_all(&self) -> bool {
        self.allow_all
    }

    /// Sorted, comma-separated view of the configured set, for the Blocked
    /// error message.
    pub fn display(&self) -> String {
        let names: Vec<&str> = self.commands.iter().map(String::as_str).collect();
        names.join(", ")
    }
}
