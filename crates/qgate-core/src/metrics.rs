//! Injected metrics sinks for qgate components.
//!
//! Components receive an `Arc<dyn MetricsSink>` instead of touching
//! process-wide counters. [`NoopMetrics`] is the default; [`InMemoryMetrics`]
//! keeps named counters and millisecond histograms and can [`flush`] them as
//! a single `tracing::info!` event.
//!
//! [`flush`]: InMemoryMetrics::flush

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Counter and histogram capability.
pub trait MetricsSink: Send + Sync {
    /// Add `by` to the counter `name`.
    fn incr(&self, name: &str, by: u64);

    /// Record one millisecond observation under `name`.
    fn observe_ms(&self, name: &str, value_ms: u64);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn incr(&self, _name: &str, _by: u64) {}
    fn observe_ms(&self, _name: &str, _value_ms: u64) {}
}

/// Shared no-op sink.
pub fn noop() -> Arc<dyn MetricsSink> {
    Arc::new(NoopMetrics)
}

/// Summary of one instrumented operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    pub runs: u64,
    pub failures: u64,
    pub avg_ms: u64,
    pub samples: u64,
}

/// Named counters and histograms held in memory.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<BTreeMap<String, u64>>,
    histograms: Mutex<BTreeMap<String, Vec<u64>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current value of a counter (0 when never incremented).
    pub fn counter(&self, name: &str) -> u64 {
        lock(&self.counters).get(name).copied().unwrap_or(0)
    }

    /// Observations recorded under `name`, in recording order.
    pub fn samples(&self, name: &str) -> Vec<u64> {
        lock(&self.histograms).get(name).cloned().unwrap_or_default()
    }

    /// Summary of an operation wrapped with [`instrument`].
    pub fn instrument_snapshot(&self, name: &str) -> InstrumentSnapshot {
        let durations = self.samples(&format!("{name}.duration_ms"));
        let avg_ms = if durations.is_empty() {
            0
        } else {
            durations.iter().sum::<u64>() / durations.len() as u64
        };
        InstrumentSnapshot {
            runs: self.counter(&format!("{name}.runs")),
            failures: self.counter(&format!("{name}.failures")),
            avg_ms,
            samples: durations.len() as u64,
        }
    }

    /// Emit all counters as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a pipeline run) rather than
    /// on every increment.
    pub fn flush(&self) {
        let counters = lock(&self.counters).clone();
        let histogram_sizes: BTreeMap<String, usize> = lock(&self.histograms)
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect();
        tracing::info!(
            metric = "flush",
            counters = ?counters,
            histogram_samples = ?histogram_sizes,
        );
    }

    /// Reset everything (useful in tests).
    pub fn reset(&self) {
        lock(&self.counters).clear();
        lock(&self.histograms).clear();
    }
}

impl MetricsSink for InMemoryMetrics {
    fn incr(&self, name: &str, by: u64) {
        *lock(&self.counters).entry(name.to_string()).or_insert(0) += by;
        tracing::trace!(metric = name, by, "counter incremented");
    }

    fn observe_ms(&self, name: &str, value_ms: u64) {
        lock(&self.histograms)
            .entry(name.to_string())
            .or_default()
            .push(value_ms);
    }
}

/// Run `f`, recording `<name>.runs`, `<name>.failures` and
/// `<name>.duration_ms` into `sink`. The result is passed through untouched.
pub fn instrument<T, E, F>(sink: &dyn MetricsSink, name: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let started = Instant::now();
    sink.incr(&format!("{name}.runs"), 1);
    let out = f();
    if out.is_err() {
        sink.incr(&format!("{name}.failures"), 1);
    }
    sink.observe_ms(&format!("{name}.duration_ms"), elapsed_ms(started));
    out
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
