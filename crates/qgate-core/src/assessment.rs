//! Combined release/promotion/maturity assessment.
//!
//! [`assess`] runs the release policy, the promotion gate, the policy rules
//! and the maturity scorer over one finding set and folds them into a
//! single [`GateVerdict`]:
//!
//! 1. release decision `NO_GO` → `NoGo`
//! 2. promotion gate denies → `Block`
//! 3. otherwise the release status (`Go` / `ConditionalGo`)
//!
//! Policy-rule violations are reported alongside but do not change the
//! verdict.

use std::fmt;

use chrono::{DateTime, Utc};
use qgate_state::ContentDigest;
use serde::{Deserialize, Serialize};

use crate::config::GateConfig;
use crate::domain::{Finding, FindingCounts, Result};
use crate::maturity::{compute_maturity, EnvironmentProfile, MaturitySnapshot};
use crate::obs;
use crate::policy_rules::{evaluate_policy_rules, PolicyInput, PolicyVerdict};
use crate::promotion_gate::{evaluate_promotion, PromotionGateResult};
use crate::release_policy::{evaluate_release, ReleaseDecision, ReleaseStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateVerdict {
    Go,
    ConditionalGo,
    NoGo,
    Block,
}

impl From<ReleaseStatus> for GateVerdict {
    fn from(status: ReleaseStatus) -> Self {
        match status {
            ReleaseStatus::Go => Self::Go,
            ReleaseStatus::ConditionalGo => Self::ConditionalGo,
            ReleaseStatus::NoGo => Self::NoGo,
        }
    }
}

impl fmt::Display for GateVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Go => "GO",
            Self::ConditionalGo => "CONDITIONAL_GO",
            Self::NoGo => "NO_GO",
            Self::Block => "BLOCK",
        };
        f.write_str(s)
    }
}

/// Source and destination environment of a promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionTarget {
    pub from: String,
    pub to: String,
}

impl PromotionTarget {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateAssessment {
    pub verdict: GateVerdict,
    pub release: ReleaseDecision,
    pub promotion: PromotionGateResult,
    pub policy: PolicyVerdict,
    pub maturity: MaturitySnapshot,
    pub counts: FindingCounts,
    pub evaluated_at: DateTime<Utc>,
}

/// Digest input: the assessment minus its timestamp.
#[derive(Serialize)]
struct DigestView<'a> {
    verdict: GateVerdict,
    release: &'a ReleaseDecision,
    promotion: &'a PromotionGateResult,
    policy: &'a PolicyVerdict,
    maturity: &'a MaturitySnapshot,
    counts: &'a FindingCounts,
}

impl GateAssessment {
    /// SHA-256 over the canonical JSON of the assessment, excluding
    /// `evaluated_at`.
    pub fn digest(&self) -> Result<ContentDigest> {
        let view = DigestView {
            verdict: self.verdict,
            release: &self.release,
            promotion: &self.promotion,
            policy: &self.policy,
            maturity: &self.maturity,
            counts: &self.counts,
        };
        let bytes = serde_json::to_vec(&view)?;
        Ok(ContentDigest::from_bytes(&bytes))
    }

    pub fn is_releasable(&self) -> bool {
        matches!(self.verdict, GateVerdict::Go | GateVerdict::ConditionalGo)
    }
}

fn fold_verdict(release: &ReleaseDecision, promotion: &PromotionGateResult) -> GateVerdict {
    if release.status == ReleaseStatus::NoGo {
        GateVerdict::NoGo
    } else if !promotion.allowed {
        GateVerdict::Block
    } else {
        release.status.into()
    }
}

/// Evaluate `findings` for promotion along `target`.
pub fn assess(
    findings: &[Finding],
    target: &PromotionTarget,
    profile: &EnvironmentProfile,
    config: &GateConfig,
) -> GateAssessment {
    let counts = FindingCounts::from_findings(findings);
    let release = evaluate_release(findings, config.min_score_go);
    let promotion = evaluate_promotion(&target.from, &target.to, &counts, &config.promotion);
    let policy = evaluate_policy_rules(&PolicyInput::from_findings(findings), &config.policy_rules);
    let maturity = compute_maturity(findings, profile);
    let verdict = fold_verdict(&release, &promotion);

    obs::emit_gate_assessed(&verdict.to_string(), release.score, maturity.score);
    GateAssessment {
        verdict,
        release,
        promotion,
        policy,
        maturity,
        counts,
        evaluated_at: Utc::now(),
    }
}
