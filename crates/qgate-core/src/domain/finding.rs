//! Finding model shared by every check and analyzer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::QgateError;

/// Severity of a check, used to weight release penalties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = QgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(QgateError::InvalidInput(format!("unknown severity: {other}"))),
        }
    }
}

/// Outcome of a check.
///
/// `Fail` means the check ran and found a violation; `Error` means the
/// check could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    Error,
    Info,
}

impl CheckStatus {
    /// FAIL and ERROR both count against a release.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Fail | Self::Error)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Error => "ERROR",
            Self::Info => "INFO",
        };
        f.write_str(s)
    }
}

/// Schema-less scalar carried in finding details and drift records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view: ints, floats, bools (1/0) and numeric strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::Float(x) => Some(*x),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Finding details, forwarded unopened by every consumer.
pub type Details = BTreeMap<String, Scalar>;

/// Typed result of one quality check invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub domain: String,
    pub check_id: String,
    pub severity: Severity,
    pub status: CheckStatus,
    pub summary: String,
    #[serde(default)]
    pub details: Details,
}

impl Finding {
    pub fn new(
        domain: impl Into<String>,
        check_id: impl Into<String>,
        severity: Severity,
        status: CheckStatus,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            check_id: check_id.into(),
            severity,
            status,
            summary: summary.into(),
            details: Details::new(),
        }
    }

    /// ERROR finding for a check that could not complete.
    pub fn errored(
        domain: impl Into<String>,
        check_id: impl Into<String>,
        severity: Severity,
        error: &dyn fmt::Display,
    ) -> Self {
        Self::new(domain, check_id, severity, CheckStatus::Error, error.to_string())
            .with_detail("error", error.to_string())
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }
}

/// Outcome tallies over a finding set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingCounts {
    #[serde(default)]
    pub pass: u32,
    #[serde(default)]
    pub fail: u32,
    #[serde(default)]
    pub error: u32,
    #[serde(default)]
    pub info: u32,
}

impl FindingCounts {
    pub fn from_findings(findings: &[Finding]) -> Self {
        findings.iter().fold(Self::default(), |mut acc, f| {
            match f.status {
                CheckStatus::Pass => acc.pass += 1,
                CheckStatus::Fail => acc.fail += 1,
                CheckStatus::Error => acc.error += 1,
                CheckStatus::Info => acc.info += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> u32 {
        self.pass + self.fail + self.error + self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!(" High ".parse::<Severity>().unwrap(), Severity::High);
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn status_wire_names_are_upper_case() {
        let json = serde_json::to_string(&CheckStatus::Error).unwrap();
        assert_eq!(json, "\"ERROR\"");
        let parsed: CheckStatus = serde_json::from_str("\"PASS\"").unwrap();
        assert_eq!(parsed, CheckStatus::Pass);
    }

    #[test]
    fn finding_deserializes_with_scalar_details() {
        let json = r#"{
            "domain": "api",
            "check_id": "login",
            "severity": "high",
            "status": "FAIL",
            "summary": "401 on valid credentials",
            "details": {"status_code": 401, "latency_ms": 12.5, "retried": false, "url": "/login", "trace": null}
        }"#;
        let f: Finding = serde_json::from_str(json).unwrap();
        assert!(f.is_failure());
        assert_eq!(f.details["status_code"], Scalar::Int(401));
        assert_eq!(f.details["latency_ms"], Scalar::Float(12.5));
        assert_eq!(f.details["retried"], Scalar::Bool(false));
        assert_eq!(f.details["url"], Scalar::Text("/login".to_string()));
        assert!(f.details["trace"].is_null());
    }

    #[test]
    fn scalar_numeric_view() {
        assert_eq!(Scalar::from("3.5").as_f64(), Some(3.5));
        assert_eq!(Scalar::from(true).as_f64(), Some(1.0));
        assert_eq!(Scalar::from("abc").as_f64(), None);
        assert_eq!(Scalar::Null.as_f64(), None);
    }

    #[test]
    fn counts_tally_every_status() {
        let findings = vec![
            Finding::new("ui", "a", Severity::Low, CheckStatus::Pass, "ok"),
            Finding::new("ui", "b", Severity::Low, CheckStatus::Fail, "bad"),
            Finding::new("api", "c", Severity::High, CheckStatus::Error, "down"),
            Finding::new("sec", "d", Severity::Low, CheckStatus::Info, "note"),
            Finding::new("sec", "e", Severity::Low, CheckStatus::Pass, "ok"),
        ];
        let counts = FindingCounts::from_findings(&findings);
        assert_eq!(
            counts,
            FindingCounts {
                pass: 2,
                fail: 1,
                error: 1,
                info: 1
            }
        );
        assert_eq!(counts.total(), 5);
    }

    #[test]
    fn errored_finding_carries_message() {
        let err = anyhow::anyhow!("connection refused");
        let f = Finding::errored("api", "health", Severity::High, &err);
        assert_eq!(f.status, CheckStatus::Error);
        assert_eq!(f.summary, "connection refused");
        assert_eq!(f.details["error"], Scalar::from("connection refused"));
    }
}
