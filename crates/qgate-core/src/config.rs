//! Gate configuration.
//!
//! Loaded from TOML; every section is optional and falls back to the
//! built-in defaults. A handful of scalar knobs can be overridden from the
//! environment:
//!
//! | variable                   | field                     |
//! |----------------------------|---------------------------|
//! | `QGATE_MIN_SCORE_GO`       | `min_score_go`            |
//! | `QGATE_MAX_WORKERS`        | `dispatch.max_workers`    |
//! | `QGATE_TASK_TIMEOUT_MS`    | `dispatch.task_timeout_ms`|
//! | `QGATE_HEAL_MAX_ATTEMPTS`  | `healing.max_attempts`    |
//! | `QGATE_HEAL_BACKOFF_MS`    | `healing.backoff_ms`      |
//! | `QGATE_LOG`                | `logging.level`           |
//! | `QGATE_LOG_FORMAT`         | `logging.format`          |

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dispatcher::DispatchConfig;
use crate::domain::{QgateError, Result};
use crate::drift::DriftThresholds;
use crate::flaky::FlakyPolicy;
use crate::policy_rules::PolicyRuleConfig;
use crate::promotion_gate::PromotionPolicyTable;
use crate::release_policy::DEFAULT_MIN_SCORE_GO;
use crate::self_healing::HealingPolicy;
use crate::telemetry::LoggingConfig;

pub const ENV_MIN_SCORE_GO: &str = "QGATE_MIN_SCORE_GO";
pub const ENV_MAX_WORKERS: &str = "QGATE_MAX_WORKERS";
pub const ENV_TASK_TIMEOUT_MS: &str = "QGATE_TASK_TIMEOUT_MS";
pub const ENV_HEAL_MAX_ATTEMPTS: &str = "QGATE_HEAL_MAX_ATTEMPTS";
pub const ENV_HEAL_BACKOFF_MS: &str = "QGATE_HEAL_BACKOFF_MS";
pub const ENV_LOG: &str = "QGATE_LOG";
pub const ENV_LOG_FORMAT: &str = "QGATE_LOG_FORMAT";

/// Externally supplied gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub min_score_go: u8,
    /// Replaces the default qa/uat/prod table when present.
    pub promotion: PromotionPolicyTable,
    pub drift: DriftThresholds,
    pub flaky: FlakyPolicy,
    pub dispatch: DispatchConfig,
    pub healing: HealingPolicy,
    pub policy_rules: PolicyRuleConfig,
    pub logging: LoggingConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_score_go: DEFAULT_MIN_SCORE_GO,
            promotion: PromotionPolicyTable::default(),
            drift: DriftThresholds::default(),
            flaky: FlakyPolicy::default(),
            dispatch: DispatchConfig::default(),
            healing: HealingPolicy::default(),
            policy_rules: PolicyRuleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| QgateError::InvalidConfig(format!("{name}={raw:?} is not a valid value")))
}

impl GateConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading gate config");
        Self::from_toml_str(&raw)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, then validate.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MIN_SCORE_GO) {
            self.min_score_go = parse_var(ENV_MIN_SCORE_GO, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_WORKERS) {
            self.dispatch.max_workers = parse_var(ENV_MAX_WORKERS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TASK_TIMEOUT_MS) {
            let ms: u64 = parse_var(ENV_TASK_TIMEOUT_MS, &raw)?;
            self.dispatch.task_timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(raw) = lookup(ENV_HEAL_MAX_ATTEMPTS) {
            self.healing.max_attempts = parse_var(ENV_HEAL_MAX_ATTEMPTS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_HEAL_BACKOFF_MS) {
            self.healing.backoff_ms = parse_var(ENV_HEAL_BACKOFF_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LOG) {
            self.logging.level = raw.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = raw.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_score_go > 100 {
            return Err(QgateError::InvalidConfig(format!(
                "min_score_go {} exceeds 100",
                self.min_score_go
            )));
        }
        if self.dispatch.max_workers == 0 {
            return Err(QgateError::InvalidConfig(
                "dispatch.max_workers must be >= 1".to_string(),
            ));
        }
        if self.healing.max_attempts == 0 {
            return Err(QgateError::InvalidConfig(
                "healing.max_attempts must be >= 1".to_string(),
            ));
        }
        let DriftThresholds { z_score, l1 } = self.drift;
        if !(z_score.is_finite() && z_score > 0.0 && l1.is_finite() && l1 > 0.0) {
            return Err(QgateError::InvalidConfig(
                "drift thresholds must be positive and finite".to_string(),
            ));
        }
        self.logging.level()?;
        self.flaky.validate()
    }
}
