//! Bounded concurrent dispatcher.
//!
//! Runs a batch of independent tasks on the Tokio runtime with at most
//! `max_workers` in flight and returns one [`AgentTaskResult`] per task in
//! **completion order**. Callers that need per-task identity must carry it
//! inside the task's output.
//!
//! A task that errors, panics, times out or is cancelled yields
//! `ok = false` and never affects its siblings.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, instrument, warn};

use crate::metrics::{self, MetricsSink};
use crate::obs;

/// Configuration for a dispatch batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum number of tasks in flight.
    pub max_workers: usize,
    /// Per-task deadline. `None` waits indefinitely.
    pub task_timeout_ms: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            task_timeout_ms: None,
        }
    }
}

/// Outcome of one dispatched task. Never both `result` and `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTaskResult<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error: Option<String>,
}

impl<T> AgentTaskResult<T> {
    pub fn succeeded(value: T) -> Self {
        Self {
            ok: true,
            result: Some(value),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Bounded worker pool over the Tokio runtime.
#[derive(Clone)]
pub struct Dispatcher {
    config: DispatchConfig,
    metrics: Arc<dyn MetricsSink>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            metrics: metrics::noop(),
            cancel: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Cooperative cancellation: once the watched value becomes `true`,
    /// pending tasks are skipped and running tasks are dropped at their
    /// next await point.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run every task and wait for all of them.
    ///
    /// Each task is a closure producing a future; the closure is only
    /// invoked once a worker slot is free.
    #[instrument(skip_all, fields(max_workers = self.config.max_workers))]
    pub async fn run<T, F, Fut, I>(&self, tasks: I) -> Vec<AgentTaskResult<T>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        let sem = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let timeout = self.config.task_timeout_ms.map(Duration::from_millis);
        let mut set = JoinSet::new();

        for task in tasks {
            let sem = Arc::clone(&sem);
            let metrics = Arc::clone(&self.metrics);
            let cancel = self.cancel.clone();

            set.spawn(async move {
                // The semaphore is never closed.
                let _permit = sem.acquire_owned().await.ok();

                if cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
                    return AgentTaskResult::failed("task cancelled before start");
                }

                let task_started = Instant::now();
                let outcome = run_one(task(), timeout, cancel).await;
                metrics.observe_ms("dispatch.task_ms", metrics::elapsed_ms(task_started));
                outcome
            });
        }

        let mut results = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            let result = joined.unwrap_or_else(|e| AgentTaskResult::failed(join_error_message(e)));
            if let Some(err) = &result.error {
                warn!(error = %err, "dispatched task failed");
            }
            results.push(result);
        }

        let failed = results.iter().filter(|r| !r.ok).count();
        self.metrics.incr("dispatch.tasks", results.len() as u64);
        self.metrics.incr("dispatch.failures", failed as u64);
        obs::emit_dispatch_completed(results.len(), failed, metrics::elapsed_ms(started));
        results
    }
}

async fn run_one<T, Fut>(
    fut: Fut,
    timeout: Option<Duration>,
    cancel: Option<watch::Receiver<bool>>,
) -> AgentTaskResult<T>
where
    Fut: Future<Output = anyhow::Result<T>>,
{
    let bounded = async {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(out) => out.map_err(|e| format!("{e:#}")),
                Err(_) => Err(format!("task timed out after {}ms", limit.as_millis())),
            },
            None => fut.await.map_err(|e| format!("{e:#}")),
        }
    };

    let outcome = match cancel {
        Some(rx) => {
            tokio::select! {
                out = bounded => out,
                _ = cancelled(rx) => Err("task cancelled".to_string()),
            }
        }
        None => bounded.await,
    };

    match outcome {
        Ok(value) => AgentTaskResult::succeeded(value),
        Err(e) => {
            debug!(error = %e, "task returned error");
            AgentTaskResult::failed(e)
        }
    }
}

/// Resolves once the flag turns `true`; pends forever if the sender is gone.
async fn cancelled(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|flag| *flag).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        format!("task panicked: {msg}")
    } else {
        format!("task aborted: {err}")
    }
}

/// Run `tasks` with at most `max_workers` in flight.
pub async fn run_distributed<T, F, Fut, I>(tasks: I, max_workers: usize) -> Vec<AgentTaskResult<T>>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    Dispatcher::new(DispatchConfig {
        max_workers,
        task_timeout_ms: None,
    })
    .run(tasks)
    .await
}
