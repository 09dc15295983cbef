//! Input Sanitization Module
//!
//! Every caller-supplied string passes through here before it can reach an
//! external process or the NVD API. The base sanitizer strips whitespace,
//! removes control characters, and truncates; format-specific sanitizers
//! (CVE identifiers, severity levels) layer on top of it.

use std::fmt;
use std::str::FromStr;

/// Maximum length of a keyword search term
pub const MAX_KEYWORD_LENGTH: usize = 256;

/// Maximum length of a CVE identifier
pub const MAX_CVE_ID_LENGTH: usize = 30;

/// Maximum length of a path or image reference argument
pub const MAX_ARG_LENGTH: usize = 512;

/// Maximum length of a full command line for the allowlisted runner
pub const MAX_COMMAND_LENGTH: usize = 2048;

/// Errors produced by the format-specific sanitizers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanitizeError {
    #[error("Invalid CVE ID format. Expected CVE-YYYY-NNNNN")]
    InvalidFormat,

    #[error("CVE ID too long")]
    TooLong,

    #[error("Invalid severity. Must be one of: negligible, low, medium, high, critical")]
    InvalidValue,

    #[error("{0} must not be empty after sanitization")]
    Empty(&'static str),
}

/// Sanitize a raw caller-supplied string.
///
/// Order matters: strip, then remove control characters (U+0000–U+001F and
/// U+007F–U+009F), then truncate to `max_len` characters. Truncation happens
/// last so the length bound holds on the cleaned string.
///
/// Never fails; an all-control-character input sanitizes to the empty string,
/// which callers must reject themselves.
pub fn sanitize(raw: &str, max_len: usize) -> String {
    raw.trim()
        .chars()
        .filter(|c| !is_control_char(*c))
        .take(max_len)
        .collect()
}

fn is_control_char(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001f}' | '\u{007f}'..='\u{009f}')
}

/// A validated CVE identifier, e.g. `CVE-2024-1234`.
///
/// Can only be constructed through [`CveId::parse`], which normalizes case
/// and enforces the `CVE-` prefix and length bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CveId(String);

impl CveId {
    /// Parse and normalize a raw CVE identifier.
    pub fn parse(raw: &str) -> Result<Self, SanitizeError> {
        let cleaned = sanitize(raw, MAX_CVE_ID_LENGTH + 1).to_uppercase();
        if cleaned.chars().count() > MAX_CVE_ID_LENGTH {
            return Err(SanitizeError::TooLong);
        }
        if !cleaned.starts_with("CVE-") {
            return Err(SanitizeError::InvalidFormat);
        }
        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimum severity filter accepted by the grype scan tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Negligible,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negligible => "negligible",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = SanitizeError;

    /// Case-insensitive parse; anything outside the five known levels is
    /// rejected with [`SanitizeError::InvalidValue`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match sanitize(s, MAX_ARG_LENGTH).to_lowercase().as_str() {
            "negligible" => Ok(Self::Negligible),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(SanitizeError::InvalidValue),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_strips_whitespace() {
        assert_eq!(sanitize("  hello  ", 100), "hello");
    }

    #[test]
    fn test_sanitize_removes_control_chars() {
        assert_eq!(sanitize("a\x00b\x1fc\x7fd", 100), "abcd");
    }

    #[test]
    fn test_sanitize_removes_c1_range() {
        assert_eq!(sanitize("a\u{0085}b\u{009f}c", 100), "abc");
    }

    #[test]
    fn test_sanitize_truncates_after_removal() {
        // Control characters must not count toward the length bound
        assert_eq!(sanitize("\x01\x02abcdef", 4), "abcd");
    }

    #[test]
    fn test_sanitize_all_control_chars_yields_empty() {
        assert_eq!(sanitize("\x00\x01\x1f\x7f", 100), "");
    }

    #[test]
    fn test_cve_id_normalizes() {
        let id = CveId::parse("  cve-2024-1234  ").unwrap();
        assert_eq!(id.as_str(), "CVE-2024-1234");
    }

    #[test]
    fn test_cve_id_rejects_bad_prefix() {
        assert_eq!(CveId::parse("not-a-cve"), Err(SanitizeError::InvalidFormat));
    }

    #[test]
    fn test_cve_id_rejects_too_long() {
        let long = format!("CVE-{}", "9".repeat(40));
        assert_eq!(CveId::parse(&long), Err(SanitizeError::TooLong));
    }

    #[test]
    fn test_severity_case_insensitive() {
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!(" Critical ".parse::<Severity>().unwrap(), Severity::Critical);
    }

    #[test]
    fn test_severity_rejects_unknown() {
        assert_eq!("extreme".parse::<Severity>(), Err(SanitizeError::InvalidValue));
        let msg = "extreme".parse::<Severity>().unwrap_err().to_string();
        for level in ["negligible", "low", "medium", "high", "critical"] {
            assert!(msg.contains(level));
        }
    }

    proptest! {
        /// Control-only inputs always sanitize to the empty string
        #[test]
        fn prop_control_only_sanitizes_empty(s in proptest::collection::vec(0u32..0x20u32, 0..64)) {
            let raw: String = s.iter().filter_map(|c| char::from_u32(*c)).collect();
            prop_assert_eq!(sanitize(&raw, 100), "");
        }

        /// Sanitized output never exceeds the length bound and never
        /// contains control characters
        #[test]
        fn prop_sanitize_bounds(raw in ".*", max_len in 0usize..64) {
            let out = sanitize(&raw, max_len);
            prop_assert!(out.chars().count() <= max_len);
            prop_assert!(!out.chars().any(super::is_control_char));
        }

        /// Long printable inputs truncate to exactly max_len
        #[test]
        fn prop_truncates_to_exact_len(raw in "[a-zA-Z0-9]{65,128}", max_len in 1usize..64) {
            prop_assert_eq!(sanitize(&raw, max_len).chars().count(), max_len);
        }
    }
}
