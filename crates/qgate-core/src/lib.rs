//! qgate core library
//!
//! Aggregates quality findings from pluggable checks into release and
//! promotion decisions: a bounded concurrent dispatcher, a self-healing
//! retry executor, drift/flaky/percentile analyzers, the release policy
//! engine with its promotion gate, and a maturity scorer.

pub mod assessment;
pub mod check;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod drift;
pub mod flaky;
pub mod maturity;
pub mod metrics;
pub mod obs;
pub mod percentile;
pub mod policy_rules;
pub mod promotion_gate;
pub mod release_policy;
pub mod self_healing;
pub mod telemetry;

pub use domain::{
    CheckStatus, Details, Finding, FindingCounts, QgateError, Result, Scalar, Severity,
};

pub use assessment::{assess, GateAssessment, GateVerdict, PromotionTarget};
pub use check::{run_checks, CheckBatch, CheckProducer};
pub use config::GateConfig;
pub use dispatcher::{run_distributed, AgentTaskResult, DispatchConfig, Dispatcher};
pub use drift::{
    compute_drift, DriftAnalysis, DriftAnalyzer, DriftReport, DriftSummary, DriftThresholds,
    Record,
};
pub use flaky::{FlakyGovernor, FlakyPolicy, FlakyRecord, FlakyStatus};
pub use maturity::{compute_maturity, EnvironmentProfile, MaturitySnapshot, MaturityTier};
pub use metrics::{InMemoryMetrics, MetricsSink, NoopMetrics};
pub use percentile::{compute_percentiles, from_durations, PercentileSummary};
pub use policy_rules::{
    evaluate_policy_rules, PolicyDecision, PolicyInput, PolicyRuleConfig, PolicyVerdict,
    PolicyViolation,
};
pub use promotion_gate::{
    evaluate_promotion, PromotionGateResult, PromotionPolicy, PromotionPolicyTable,
};
pub use release_policy::{evaluate_release, ReleaseDecision, ReleaseStatus};
pub use self_healing::{
    run_with_self_healing, run_with_self_healing_async, HealResult, HealingPolicy,
    SelfHealingExecutor,
};

pub use qgate_state::{
    ContentDigest, HistoryLog, JsonFileHistoryLog, JsonFileKeyedStore, KeyedStore,
    MemoryHistoryLog, MemoryKeyedStore, StorageError,
};

/// Crate version, as published.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
