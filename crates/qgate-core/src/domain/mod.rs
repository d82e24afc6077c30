//! Domain models for qgate.
//!
//! Canonical definitions for the shared value types:
//! - `Finding`: typed result of one quality check
//! - `FindingCounts`: outcome tallies over a finding set
//! - `QgateError`: crate-wide error taxonomy

pub mod error;
pub mod finding;

pub use error::{QgateError, Result};
pub use finding::{CheckStatus, Details, Finding, FindingCounts, Scalar, Severity};
