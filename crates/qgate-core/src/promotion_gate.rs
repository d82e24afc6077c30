//! Environment promotion gate.
//!
//! Looks up the destination environment's `{max_fail, allow_error}` policy
//! and checks the run's failure/error counts against it. Unknown
//! environments get the strictest policy (`{0, false}`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::FindingCounts;
use crate::obs;

/// Per-environment promotion thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionPolicy {
    pub max_fail: u32,
    pub allow_error: bool,
}

impl PromotionPolicy {
    /// Policy applied to environments missing from the table.
    pub const STRICT: Self = Self {
        max_fail: 0,
        allow_error: false,
    };

    pub fn admits(&self, counts: &FindingCounts) -> bool {
        counts.fail <= self.max_fail && (self.allow_error || counts.error == 0)
    }
}

/// Environment name → policy. Names are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromotionPolicyTable(BTreeMap<String, PromotionPolicy>);

impl Default for PromotionPolicyTable {
    fn default() -> Self {
        Self::from_entries([
            (
                "qa",
                PromotionPolicy {
                    max_fail: 5,
                    allow_error: true,
                },
            ),
            (
                "uat",
                PromotionPolicy {
                    max_fail: 2,
                    allow_error: false,
                },
            ),
            ("prod", PromotionPolicy::STRICT),
        ])
    }
}

impl PromotionPolicyTable {
    pub fn from_entries<K: AsRef<str>>(entries: impl IntoIterator<Item = (K, PromotionPolicy)>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_lowercase(), v))
                .collect(),
        )
    }

    /// Policy for `env`, or [`PromotionPolicy::STRICT`] when unknown.
    pub fn policy_for(&self, env: &str) -> PromotionPolicy {
        let key = env.trim().to_lowercase();
        self.0
            .get(&key)
            .or_else(|| {
                self.0
                    .iter()
                    .find(|(k, _)| k.to_lowercase() == key)
                    .map(|(_, v)| v)
            })
            .copied()
            .unwrap_or(PromotionPolicy::STRICT)
    }

    pub fn environments(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionGateResult {
    pub from: String,
    pub to: String,
    pub allowed: bool,
    pub reason: String,
    pub policy: PromotionPolicy,
}

/// Decide whether a build may move from `from` to `to`.
pub fn evaluate_promotion(
    from: &str,
    to: &str,
    counts: &FindingCounts,
    table: &PromotionPolicyTable,
) -> PromotionGateResult {
    let policy = table.policy_for(to);
    let allowed = policy.admits(counts);
    let reason = if allowed {
        "Gate passed".to_string()
    } else {
        format!(
            "Gate failed: fail={}, error={}, policy=max_fail={}, allow_error={}",
            counts.fail, counts.error, policy.max_fail, policy.allow_error
        )
    };

    obs::emit_promotion_evaluated(from, to, allowed);
    PromotionGateResult {
        from: from.to_string(),
        to: to.to_string(),
        allowed,
        reason,
        policy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_three_environments() {
        let table = PromotionPolicyTable::default();
        let envs: Vec<&str> = table.environments().collect();
        assert_eq!(envs, vec!["prod", "qa", "uat"]);
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        let table = PromotionPolicyTable::default();
        assert_eq!(table.policy_for(" UAT ").max_fail, 2);
    }

    #[test]
    fn unknown_environment_is_strict() {
        let table = PromotionPolicyTable::default();
        assert_eq!(table.policy_for("staging"), PromotionPolicy::STRICT);
    }

    #[test]
    fn deserialized_keys_are_matched_case_insensitively() {
        let table: PromotionPolicyTable =
            serde_json::from_str(r#"{"Staging": {"max_fail": 1, "allow_error": true}}"#).unwrap();
        assert_eq!(table.policy_for("staging").max_fail, 1);
    }
}
