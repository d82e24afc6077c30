//! Flaky test governance.
//!
//! Tracks pass/fail outcomes per test id and quarantines tests whose
//! failure rate sits in the ambiguous band: failing too often to trust,
//! passing too often to call broken.
//!
//! The rate is computed over a sliding window of the most recent outcomes
//! (`FlakyPolicy::window`). With `window = None` it falls back to the
//! all-time `fails / runs` ratio. Quarantine is one-way.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use qgate_state::{KeyedStore, MemoryKeyedStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{QgateError, Result};
use crate::obs;

/// Quarantine eligibility rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlakyPolicy {
    /// Outcomes required (in the window, or all-time) before quarantine.
    pub min_runs: u32,
    /// Inclusive lower bound of the flaky band.
    pub lower_rate: f64,
    /// Exclusive upper bound of the flaky band.
    pub upper_rate: f64,
    /// Number of recent outcomes the rate is computed over. Written as
    /// `0` in config files to mean unbounded.
    #[serde(with = "window_serde")]
    pub window: Option<usize>,
}

mod window_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(window: &Option<usize>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(window.unwrap_or(0) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
        let n = usize::deserialize(d)?;
        Ok((n > 0).then_some(n))
    }
}

impl Default for FlakyPolicy {
    fn default() -> Self {
        Self {
            min_runs: 5,
            lower_rate: 0.2,
            upper_rate: 0.8,
            window: Some(20),
        }
    }
}

impl FlakyPolicy {
    /// Reject bands and windows that could never quarantine anything.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.lower_rate) || !(0.0..=1.0).contains(&self.upper_rate) {
            return Err(QgateError::InvalidConfig(
                "flaky rate bounds must lie in [0, 1]".to_string(),
            ));
        }
        if self.lower_rate >= self.upper_rate {
            return Err(QgateError::InvalidConfig(format!(
                "flaky lower_rate {} must be below upper_rate {}",
                self.lower_rate, self.upper_rate
            )));
        }
        if let Some(window) = self.window {
            if window == 0 || window < self.min_runs as usize {
                return Err(QgateError::InvalidConfig(format!(
                    "flaky window {window} must be >= min_runs {}",
                    self.min_runs
                )));
            }
        }
        Ok(())
    }

    fn in_band(&self, rate: f64) -> bool {
        self.lower_rate <= rate && rate < self.upper_rate
    }
}

/// Per-test state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlakyRecord {
    /// All-time outcome count.
    pub runs: u64,
    /// All-time failure count.
    pub fails: u64,
    pub quarantined: bool,
    pub updated_at: Option<DateTime<Utc>>,
    /// Most recent outcomes, oldest first; `true` means failed.
    #[serde(default)]
    pub recent: VecDeque<bool>,
}

impl FlakyRecord {
    fn observe(&mut self, failed: bool, policy: &FlakyPolicy) {
        self.runs += 1;
        if failed {
            self.fails += 1;
        }
        if let Some(window) = policy.window {
            self.recent.push_back(failed);
            while self.recent.len() > window {
                self.recent.pop_front();
            }
        }
    }

    /// (runs, fails) the rate is computed over.
    fn sample(&self, policy: &FlakyPolicy) -> (u64, u64) {
        match policy.window {
            Some(_) => (
                self.recent.len() as u64,
                self.recent.iter().filter(|f| **f).count() as u64,
            ),
            None => (self.runs, self.fails),
        }
    }

    /// Failure rate under `policy`; 0 before any run.
    pub fn rate(&self, policy: &FlakyPolicy) -> f64 {
        let (runs, fails) = self.sample(policy);
        fails as f64 / runs.max(1) as f64
    }

    fn eligible(&self, policy: &FlakyPolicy) -> bool {
        let (runs, _) = self.sample(policy);
        runs >= u64::from(policy.min_runs) && policy.in_band(self.rate(policy))
    }
}

/// Reporting view of one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlakyStatus {
    pub test_id: String,
    pub runs: u64,
    pub fails: u64,
    pub quarantined: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub flaky_rate: f64,
}

impl FlakyStatus {
    fn from_record(test_id: &str, record: &FlakyRecord, policy: &FlakyPolicy) -> Self {
        Self {
            test_id: test_id.to_string(),
            runs: record.runs,
            fails: record.fails,
            quarantined: record.quarantined,
            updated_at: record.updated_at,
            flaky_rate: (record.rate(policy) * 1000.0).round() / 1000.0,
        }
    }
}

/// Flaky registry over a keyed store.
#[derive(Clone)]
pub struct FlakyGovernor {
    store: Arc<dyn KeyedStore<FlakyRecord>>,
    policy: FlakyPolicy,
}

impl FlakyGovernor {
    pub fn new(store: Arc<dyn KeyedStore<FlakyRecord>>, policy: FlakyPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { store, policy })
    }

    /// Governor with an in-memory registry and the default policy.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryKeyedStore::new()),
            policy: FlakyPolicy::default(),
        }
    }

    pub fn policy(&self) -> &FlakyPolicy {
        &self.policy
    }

    /// Record one outcome for `test_id` and return its updated status.
    pub fn record_result(&self, test_id: &str, passed: bool) -> Result<FlakyStatus> {
        let mut record = self.store.get(test_id)?.unwrap_or_default();
        record.observe(!passed, &self.policy);

        let was_quarantined = record.quarantined;
        record.quarantined |= record.eligible(&self.policy);
        record.updated_at = Some(Utc::now());

        let status = FlakyStatus::from_record(test_id, &record, &self.policy);
        self.store.put(test_id, record)?;

        if status.quarantined && !was_quarantined {
            obs::emit_quarantined(test_id, status.flaky_rate, status.runs);
        } else {
            debug!(test_id, passed, runs = status.runs, "flaky outcome recorded");
        }
        Ok(status)
    }

    /// Current status of one test, if it was ever recorded.
    pub fn status(&self, test_id: &str) -> Result<Option<FlakyStatus>> {
        Ok(self
            .store
            .get(test_id)?
            .map(|r| FlakyStatus::from_record(test_id, &r, &self.policy)))
    }

    pub fn is_quarantined(&self, test_id: &str) -> Result<bool> {
        Ok(self.store.get(test_id)?.is_some_and(|r| r.quarantined))
    }

    /// Quarantined tests with their current rate, ordered by test id.
    pub fn list_flaky(&self) -> Result<Vec<FlakyStatus>> {
        Ok(self
            .store
            .entries()?
            .into_iter()
            .filter(|(_, r)| r.quarantined)
            .map(|(id, r)| FlakyStatus::from_record(&id, &r, &self.policy))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_valid() {
        FlakyPolicy::default().validate().unwrap();
    }

    #[test]
    fn window_smaller_than_min_runs_is_rejected() {
        let policy = FlakyPolicy {
            window: Some(3),
            ..FlakyPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(QgateError::InvalidConfig(_))));
    }

    #[test]
    fn inverted_band_is_rejected() {
        let policy = FlakyPolicy {
            lower_rate: 0.8,
            upper_rate: 0.2,
            ..FlakyPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn window_keeps_only_recent_outcomes() {
        let policy = FlakyPolicy {
            window: Some(5),
            ..FlakyPolicy::default()
        };
        let mut record = FlakyRecord::default();
        for _ in 0..10 {
            record.observe(true, &policy);
        }
        for _ in 0..5 {
            record.observe(false, &policy);
        }
        assert_eq!(record.runs, 15);
        assert_eq!(record.fails, 10);
        assert_eq!(record.recent.len(), 5);
        assert_eq!(record.rate(&policy), 0.0);
    }

    #[test]
    fn zero_window_means_unbounded() {
        let policy: FlakyPolicy = serde_json::from_str(r#"{"window": 0}"#).unwrap();
        assert_eq!(policy.window, None);
        assert_eq!(policy.min_runs, 5);
        let json = serde_json::to_string(&FlakyPolicy::default()).unwrap();
        assert!(json.contains("\"window\":20"));
    }

    #[test]
    fn rate_before_any_run_is_zero() {
        assert_eq!(FlakyRecord::default().rate(&FlakyPolicy::default()), 0.0);
    }
}
