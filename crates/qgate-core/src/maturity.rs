//! Composite QA maturity score.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{CheckStatus, Finding};

/// Channels beyond this count add nothing.
pub const MAX_SCORED_CHANNELS: u32 = 11;
/// Agents beyond this count add nothing.
pub const MAX_SCORED_AGENTS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaturityTier {
    Emerging,
    Growing,
    Advanced,
    Elite,
}

impl MaturityTier {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Self::Elite,
            65..=79 => Self::Advanced,
            45..=64 => Self::Growing,
            _ => Self::Emerging,
        }
    }
}

impl fmt::Display for MaturityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Emerging => "emerging",
            Self::Growing => "growing",
            Self::Advanced => "advanced",
            Self::Elite => "elite",
        };
        f.write_str(s)
    }
}

/// Deployment metadata that feeds the score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    pub enabled_channels: u32,
    pub enabled_agents: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaturitySnapshot {
    pub score: u8,
    pub tier: MaturityTier,
    /// Rounded to 3 decimals.
    pub pass_rate: f64,
    /// FAIL and ERROR share, rounded to 3 decimals.
    pub fail_rate: f64,
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Score a finding set plus environment metadata.
pub fn compute_maturity(findings: &[Finding], profile: &EnvironmentProfile) -> MaturitySnapshot {
    let total = findings.len().max(1) as f64;
    let passed = findings
        .iter()
        .filter(|f| f.status == CheckStatus::Pass)
        .count() as f64;
    let failed = findings.iter().filter(|f| f.is_failure()).count() as f64;
    let pass_rate = passed / total;
    let fail_rate = failed / total;

    let raw = (pass_rate * 60.0) as i64
        + i64::from(profile.enabled_channels.min(MAX_SCORED_CHANNELS)) * 2
        + i64::from(profile.enabled_agents.min(MAX_SCORED_AGENTS)) * 3
        - (fail_rate * 30.0) as i64;
    let score = raw.clamp(0, 100) as u8;

    MaturitySnapshot {
        score,
        tier: MaturityTier::from_score(score),
        pass_rate: round3(pass_rate),
        fail_rate: round3(fail_rate),
    }
}
