//! Scanner Façades
//!
//! Thin wrappers that turn sanitized tool arguments into bounded external
//! calls and hand the outcome to the response normalizer:
//!
//! - `grype.rs`: container image, directory, and SBOM scanning plus local
//!   vulnerability-database maintenance
//! - `snyk.rs`: SCA, SAST, container, and IaC scanning
//! - `lab.rs`: allowlisted command runner and the os-release resource

mod grype;
mod lab;
mod snyk;

pub use grype::GrypeScanner;
pub use lab::{LabRunner, OS_RELEASE_URI};
pub use snyk::SnykScanner;
