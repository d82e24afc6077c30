//! Pluggable checks fanned out through the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use qgate_core::{
    run_checks, CheckProducer, CheckStatus, DispatchConfig, Dispatcher, Finding, Severity,
};

struct StaticCheck {
    id: &'static str,
    status: CheckStatus,
}

#[async_trait]
impl CheckProducer for StaticCheck {
    fn domain(&self) -> &str {
        "api"
    }

    fn check_id(&self) -> &str {
        self.id
    }

    async fn run(&self) -> anyhow::Result<Finding> {
        Ok(Finding::new("api", self.id, Severity::Medium, self.status, "done"))
    }
}

struct BrokenCheck;

#[async_trait]
impl CheckProducer for BrokenCheck {
    fn domain(&self) -> &str {
        "security"
    }

    fn check_id(&self) -> &str {
        "dependency-scan"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    async fn run(&self) -> anyhow::Result<Finding> {
        anyhow::bail!("scanner unreachable")
    }
}

struct HangingCheck;

#[async_trait]
impl CheckProducer for HangingCheck {
    fn domain(&self) -> &str {
        "ui"
    }

    fn check_id(&self) -> &str {
        "visual-diff"
    }

    async fn run(&self) -> anyhow::Result<Finding> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(Finding::new("ui", "visual-diff", Severity::Low, CheckStatus::Pass, ""))
    }
}

#[tokio::test]
async fn check_errors_become_error_findings() {
    let producers: Vec<Arc<dyn CheckProducer>> = vec![
        Arc::new(StaticCheck {
            id: "health",
            status: CheckStatus::Pass,
        }),
        Arc::new(StaticCheck {
            id: "contract",
            status: CheckStatus::Fail,
        }),
        Arc::new(BrokenCheck),
    ];

    let batch = run_checks(&Dispatcher::new(DispatchConfig::default()), producers).await;
    assert_eq!(batch.findings.len(), 3);
    assert!(batch.dispatch_errors.is_empty());

    let counts = batch.counts();
    assert_eq!((counts.pass, counts.fail, counts.error), (1, 1, 1));

    let errored = batch
        .findings
        .iter()
        .find(|f| f.status == CheckStatus::Error)
        .unwrap();
    assert_eq!(errored.domain, "security");
    assert_eq!(errored.check_id, "dependency-scan");
    assert_eq!(errored.severity, Severity::High);
    assert_eq!(errored.summary, "scanner unreachable");
}

#[tokio::test(start_paused = true)]
async fn timed_out_checks_are_dispatch_errors() {
    let producers: Vec<Arc<dyn CheckProducer>> = vec![
        Arc::new(StaticCheck {
            id: "health",
            status: CheckStatus::Pass,
        }),
        Arc::new(HangingCheck),
    ];
    let dispatcher = Dispatcher::new(DispatchConfig {
        max_workers: 2,
        task_timeout_ms: Some(1_000),
    });

    let batch = run_checks(&dispatcher, producers).await;
    assert_eq!(batch.findings.len(), 1);
    assert_eq!(batch.dispatch_errors, vec!["task timed out after 1000ms"]);
}
