//! Release policy engine.
//!
//! Turns an ordered finding set into a GO / CONDITIONAL_GO / NO_GO
//! decision with a 0–100 score. Pure function; no state is kept between
//! calls.
//!
//! Decision order:
//! 1. any critical FAIL/ERROR → `NoGo` (absolute veto, score ignored)
//! 2. score below `min_score_go` → `ConditionalGo`
//! 3. any high FAIL/ERROR → `ConditionalGo`
//! 4. otherwise → `Go`

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{Finding, Severity};
use crate::obs;

/// Default GO threshold.
pub const DEFAULT_MIN_SCORE_GO: u8 = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseStatus {
    Go,
    ConditionalGo,
    NoGo,
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Go => "GO",
            Self::ConditionalGo => "CONDITIONAL_GO",
            Self::NoGo => "NO_GO",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDecision {
    pub status: ReleaseStatus,
    pub reason: String,
    pub score: u8,
}

/// Score deducted for one FAIL/ERROR finding of the given severity.
pub fn severity_penalty(severity: Severity) -> i32 {
    match severity {
        Severity::Critical => 30,
        Severity::High => 15,
        Severity::Medium => 8,
        Severity::Low => 4,
    }
}

/// Evaluate a finding set against the release policy.
pub fn evaluate_release(findings: &[Finding], min_score_go: u8) -> ReleaseDecision {
    let mut score: i32 = 100;
    let mut critical_fail = 0u32;
    let mut high_fail = 0u32;

    for f in findings.iter().filter(|f| f.is_failure()) {
        match f.severity {
            Severity::Critical => critical_fail += 1,
            Severity::High => high_fail += 1,
            Severity::Medium | Severity::Low => {}
        }
        score -= severity_penalty(f.severity);
    }

    let score = score.clamp(0, 100) as u8;

    let decision = if critical_fail > 0 {
        ReleaseDecision {
            status: ReleaseStatus::NoGo,
            reason: format!("Critical failures={critical_fail}"),
            score,
        }
    } else if score < min_score_go {
        ReleaseDecision {
            status: ReleaseStatus::ConditionalGo,
            reason: format!("Score {score} below GO threshold {min_score_go}"),
            score,
        }
    } else if high_fail > 0 {
        ReleaseDecision {
            status: ReleaseStatus::ConditionalGo,
            reason: format!("High failures={high_fail}"),
            score,
        }
    } else {
        ReleaseDecision {
            status: ReleaseStatus::Go,
            reason: "Quality gates satisfied".to_string(),
            score,
        }
    };

    obs::emit_release_evaluated(&decision.status.to_string(), decision.score, &decision.reason);
    decision
}
