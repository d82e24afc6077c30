//! Generic self-healing executor.
//!
//! Retries a zero-argument unit of work with a fixed backoff until it
//! succeeds or the attempt budget is spent. The executor knows nothing
//! about what the unit does; check-specific healing (locator repair,
//! reconnects) belongs to the caller.
//!
//! Exhaustion is reported as `HealResult { ok: false, .. }`, never as an
//! error or panic.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::metrics::{self, MetricsSink};
use crate::obs;

/// Bounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealingPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for HealingPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 250,
        }
    }
}

impl HealingPolicy {
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff_ms,
        }
    }

    /// Attempt budget; zero is treated as one.
    pub fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Terminal outcome of a self-healing run.
///
/// `attempts` is 1-based and equals the number of invocations made.
/// `healed` is true iff `ok` and `attempts > 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealResult<T> {
    pub ok: bool,
    pub attempts: u32,
    pub healed: bool,
    pub last_error: String,
    pub result: Option<T>,
}

impl<T> HealResult<T> {
    fn succeeded(attempts: u32, value: T) -> Self {
        Self {
            ok: true,
            attempts,
            healed: attempts > 1,
            last_error: String::new(),
            result: Some(value),
        }
    }

    fn exhausted(attempts: u32, last_error: String) -> Self {
        Self {
            ok: false,
            attempts,
            healed: false,
            last_error,
            result: None,
        }
    }

    /// Convert into a `Result`, using `last_error` as the failure.
    pub fn into_result(self) -> Result<T, String> {
        match self.result {
            Some(value) if self.ok => Ok(value),
            _ => Err(self.last_error),
        }
    }
}

/// Self-healing executor reporting into a metrics sink.
#[derive(Clone)]
pub struct SelfHealingExecutor {
    policy: HealingPolicy,
    metrics: Arc<dyn MetricsSink>,
}

impl SelfHealingExecutor {
    pub fn new(policy: HealingPolicy) -> Self {
        Self {
            policy,
            metrics: metrics::noop(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn policy(&self) -> &HealingPolicy {
        &self.policy
    }

    /// Run `f` synchronously, sleeping the calling thread between attempts.
    pub fn run<T, E, F>(&self, mut f: F) -> HealResult<T>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        let budget = self.policy.attempt_budget();
        let mut last_error = String::new();

        for attempt in 1..=budget {
            self.metrics.incr("self_healing.attempts", 1);
            match f() {
                Ok(value) => return self.finish_ok(attempt, value),
                Err(e) => {
                    last_error = e.to_string();
                    self.note_failure(attempt, budget, &last_error);
                    if attempt < budget {
                        std::thread::sleep(self.policy.backoff());
                    }
                }
            }
        }

        self.finish_exhausted(budget, last_error)
    }

    /// Async variant of [`run`](Self::run); backoff uses `tokio::time::sleep`.
    pub async fn run_async<T, E, F, Fut>(&self, mut f: F) -> HealResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let budget = self.policy.attempt_budget();
        let mut last_error = String::new();

        for attempt in 1..=budget {
            self.metrics.incr("self_healing.attempts", 1);
            match f().await {
                Ok(value) => return self.finish_ok(attempt, value),
                Err(e) => {
                    last_error = e.to_string();
                    self.note_failure(attempt, budget, &last_error);
                    if attempt < budget {
                        tokio::time::sleep(self.policy.backoff()).await;
                    }
                }
            }
        }

        self.finish_exhausted(budget, last_error)
    }

    fn note_failure(&self, attempt: u32, budget: u32, error: &str) {
        self.metrics.incr("self_healing.failed_attempts", 1);
        debug!(attempt, max_attempts = budget, error = %error, "attempt failed");
        if attempt < budget {
            warn!(attempt, max_attempts = budget, error = %error, "transient failure, retrying");
        }
    }

    fn finish_ok<T>(&self, attempt: u32, value: T) -> HealResult<T> {
        if attempt > 1 {
            self.metrics.incr("self_healing.healed", 1);
            obs::emit_healed(attempt);
        }
        HealResult::succeeded(attempt, value)
    }

    fn finish_exhausted<T>(&self, attempts: u32, last_error: String) -> HealResult<T> {
        self.metrics.incr("self_healing.exhausted", 1);
        obs::emit_healing_exhausted(attempts, &last_error);
        HealResult::exhausted(attempts, last_error)
    }
}

/// Retry `f` up to `max_attempts` times with `backoff_ms` between attempts.
pub fn run_with_self_healing<T, E, F>(f: F, max_attempts: u32, backoff_ms: u64) -> HealResult<T>
where
    F: FnMut() -> Result<T, E>,
    E: Display,
{
    SelfHealingExecutor::new(HealingPolicy::new(max_attempts, backoff_ms)).run(f)
}

/// Async counterpart of [`run_with_self_healing`].
pub async fn run_with_self_healing_async<T, E, F, Fut>(
    f: F,
    max_attempts: u32,
    backoff_ms: u64,
) -> HealResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    SelfHealingExecutor::new(HealingPolicy::new(max_attempts, backoff_ms))
        .run_async(f)
        .await
}
