//! Check producer boundary and batch execution.
//!
//! Concrete checks (browser workflows, API probes, scanners) live outside
//! this crate and implement [`CheckProducer`]. [`run_checks`] fans them out
//! through a [`Dispatcher`] and folds the outcomes into a [`CheckBatch`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::domain::{Finding, FindingCounts, Severity};

/// A pluggable quality check.
///
/// `run` returns exactly one [`Finding`] or an error when the check could
/// not complete.
#[async_trait]
pub trait CheckProducer: Send + Sync {
    /// Quality domain, e.g. `functional`, `api`, `security`.
    fn domain(&self) -> &str;

    /// Stable identifier of the check.
    fn check_id(&self) -> &str;

    /// Severity attached to an ERROR finding when `run` fails.
    fn severity(&self) -> Severity {
        Severity::Medium
    }

    async fn run(&self) -> anyhow::Result<Finding>;
}

/// Findings collected from one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckBatch {
    /// One finding per check that reached completion or returned an error,
    /// in completion order.
    pub findings: Vec<Finding>,
    /// Tasks lost to panics, timeouts or cancellation.
    pub dispatch_errors: Vec<String>,
}

impl CheckBatch {
    pub fn counts(&self) -> FindingCounts {
        FindingCounts::from_findings(&self.findings)
    }
}

type CheckTask = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<Finding>> + Send>;

fn check_task(producer: Arc<dyn CheckProducer>) -> CheckTask {
    Box::new(move || {
        async move {
            match producer.run().await {
                Ok(finding) => Ok(finding),
                Err(e) => {
                    warn!(
                        check_id = %producer.check_id(),
                        error = %e,
                        "check could not complete"
                    );
                    Ok(Finding::errored(
                        producer.domain(),
                        producer.check_id(),
                        producer.severity(),
                        &format!("{e:#}"),
                    ))
                }
            }
        }
        .boxed()
    })
}

/// Run every producer through `dispatcher` and collect their findings.
pub async fn run_checks(
    dispatcher: &Dispatcher,
    producers: Vec<Arc<dyn CheckProducer>>,
) -> CheckBatch {
    let total = producers.len();
    let results = dispatcher
        .run(producers.into_iter().map(check_task))
        .await;

    let mut batch = CheckBatch::default();
    for r in results {
        match (r.result, r.error) {
            (Some(finding), _) => batch.findings.push(finding),
            (None, Some(err)) => batch.dispatch_errors.push(err),
            (None, None) => batch
                .dispatch_errors
                .push("task finished without a result".to_string()),
        }
    }

    info!(
        checks = total,
        findings = batch.findings.len(),
        dispatch_errors = batch.dispatch_errors.len(),
        "check batch collected"
    );
    batch
}
