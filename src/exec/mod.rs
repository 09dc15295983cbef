//! Bounded External Process Execution
//!
//! This module owns the two defenses between caller input and a spawned
//! process:
//!
//! - `allowlist.rs`: leading-token allowlist for the arbitrary command
//!   runner, with POSIX word-splitting via `shlex`
//! - `invoker.rs`: subprocess execution with wall-clock timeout and
//!   exit-code classification, argv passed directly to process creation
//!   (never through a shell)
//!
//! The allowlist is textual only; the no-shell invariant in the invoker is
//! the primary injection defense.

mod allowlist;
mod invoker;

pub use allowlist::{tokenize, CommandAllowlist, DEFAULT_ALLOWED_COMMANDS};
pub use invoker::{run, run_raw, Invocation, RawOutcome};
