//! vulnscan-mcp Library
//!
//! MCP server exposing security-scanning tools: container/filesystem/SBOM
//! scanning via grype, SCA/SAST/IaC scanning via snyk, CVE lookup against
//! the NVD API, and a sandboxed allowlisted command runner. Every tool is a
//! thin façade around one bounded external call, with shared sanitization,
//! normalization, and bearer auth.

pub mod auth;
pub mod config;
pub mod exec;
pub mod nvd;
pub mod protocol;
pub mod response;
pub mod sanitize;
pub mod scanners;
pub mod server;
