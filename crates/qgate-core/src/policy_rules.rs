//! Policy-as-code rule evaluator.
//!
//! A small rule set that can be replaced by an external policy engine:
//! critical security failures, execution errors and too many failures each
//! add a violation; any violation denies.

use serde::{Deserialize, Serialize};

use crate::domain::{Finding, FindingCounts, Severity};

/// Domain name identifying security checks.
pub const SECURITY_DOMAIN: &str = "security";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyRuleConfig {
    /// Deny when `fail > max_fail`.
    pub max_fail: u32,
}

impl Default for PolicyRuleConfig {
    fn default() -> Self {
        Self { max_fail: 3 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyInput {
    pub counts: FindingCounts,
    pub critical_security_failures: u32,
}

impl PolicyInput {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let critical_security_failures = findings
            .iter()
            .filter(|f| {
                f.is_failure()
                    && f.severity == Severity::Critical
                    && f.domain.eq_ignore_ascii_case(SECURITY_DOMAIN)
            })
            .count() as u32;
        Self {
            counts: FindingCounts::from_findings(findings),
            critical_security_failures,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyViolation {
    CriticalSecurityBlock,
    ExecutionErrorsPresent,
    TooManyFailures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyDecision {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub decision: PolicyDecision,
    pub violations: Vec<PolicyViolation>,
    pub input: PolicyInput,
}

/// Evaluate `input` against the rule set.
pub fn evaluate_policy_rules(input: &PolicyInput, config: &PolicyRuleConfig) -> PolicyVerdict {
    let mut violations = Vec::new();
    if input.critical_security_failures > 0 {
        violations.push(PolicyViolation::CriticalSecurityBlock);
    }
    if input.counts.error > 0 {
        violations.push(PolicyViolation::ExecutionErrorsPresent);
    }
    if input.counts.fail > config.max_fail {
        violations.push(PolicyViolation::TooManyFailures);
    }

    let decision = if violations.is_empty() {
        PolicyDecision::Allow
    } else {
        PolicyDecision::Deny
    };
    PolicyVerdict {
        decision,
        violations,
        input: *input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CheckStatus;

    #[test]
    fn clean_input_is_allowed() {
        let v = evaluate_policy_rules(&PolicyInput::default(), &PolicyRuleConfig::default());
        assert_eq!(v.decision, PolicyDecision::Allow);
        assert!(v.violations.is_empty());
    }

    #[test]
    fn every_rule_can_fire() {
        let findings = vec![
            Finding::new("security", "secrets", Severity::Critical, CheckStatus::Fail, "leak"),
            Finding::new("api", "health", Severity::Low, CheckStatus::Error, "timeout"),
            Finding::new("ui", "a", Severity::Low, CheckStatus::Fail, ""),
            Finding::new("ui", "b", Severity::Low, CheckStatus::Fail, ""),
            Finding::new("ui", "c", Severity::Low, CheckStatus::Fail, ""),
        ];
        let input = PolicyInput::from_findings(&findings);
        assert_eq!(input.critical_security_failures, 1);
        assert_eq!(input.counts.fail, 4);

        let v = evaluate_policy_rules(&input, &PolicyRuleConfig::default());
        assert_eq!(v.decision, PolicyDecision::Deny);
        assert_eq!(
            v.violations,
            vec![
                PolicyViolation::CriticalSecurityBlock,
                PolicyViolation::ExecutionErrorsPresent,
                PolicyViolation::TooManyFailures,
            ]
        );
    }

    #[test]
    fn failures_at_limit_are_allowed() {
        let input = PolicyInput {
            counts: FindingCounts {
                fail: 3,
                ..FindingCounts::default()
            },
            critical_security_failures: 0,
        };
        let v = evaluate_policy_rules(&input, &PolicyRuleConfig::default());
        assert_eq!(v.decision, PolicyDecision::Allow);
    }

    #[test]
    fn violation_wire_names() {
        assert_eq!(
            serde_json::to_string(&PolicyViolation::CriticalSecurityBlock).unwrap(),
            "\"critical_security_block\""
        );
    }
}
