//! Structured observability hooks for gate lifecycle events.
//!
//! Every event carries an `event = "<area>.<what>"` field so log pipelines
//! can filter on it. Levels follow severity: vetoes and exhausted retries
//! are `warn!`, everything else `info!`.

use tracing::{info, warn};

/// RAII guard that enters an assessment-scoped tracing span.
///
/// ```ignore
/// let _span = AssessmentSpan::enter("pipeline-1234");
/// // tracing calls below are tagged with run_id = "pipeline-1234"
/// ```
pub struct AssessmentSpan {
    _span: tracing::span::EnteredSpan,
}

impl AssessmentSpan {
    /// Create and enter a span tagged with the run_id.
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("qgate.assessment", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a dispatch batch finished.
pub fn emit_dispatch_completed(total: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "dispatch.completed",
        total = total,
        failed = failed,
        duration_ms = duration_ms,
    );
}

/// Emit event: a self-healing run succeeded after retrying.
pub fn emit_healed(attempts: u32) {
    info!(event = "self_healing.healed", attempts = attempts);
}

/// Emit event: a self-healing run used every attempt.
pub fn emit_healing_exhausted(attempts: u32, last_error: &str) {
    warn!(
        event = "self_healing.exhausted",
        attempts = attempts,
        last_error = %last_error,
    );
}

/// Emit event: a drift report was persisted.
pub fn emit_drift_report(report_id: &str, ok: bool, drifted_fields: usize) {
    if ok {
        info!(event = "drift.reported", report_id = %report_id, ok = ok);
    } else {
        warn!(
            event = "drift.reported",
            report_id = %report_id,
            ok = ok,
            drifted_fields = drifted_fields,
        );
    }
}

/// Emit event: a test entered quarantine.
pub fn emit_quarantined(test_id: &str, flaky_rate: f64, runs: u64) {
    warn!(
        event = "flaky.quarantined",
        test_id = %test_id,
        flaky_rate = flaky_rate,
        runs = runs,
    );
}

/// Emit event: a release decision was computed.
pub fn emit_release_evaluated(status: &str, score: u8, reason: &str) {
    info!(
        event = "release.evaluated",
        status = %status,
        score = score,
        reason = %reason,
    );
}

/// Emit event: a promotion gate was evaluated.
pub fn emit_promotion_evaluated(from: &str, to: &str, allowed: bool) {
    info!(
        event = "promotion.evaluated",
        from = %from,
        to = %to,
        allowed = allowed,
    );
}

/// Emit event: a combined gate assessment finished.
pub fn emit_gate_assessed(verdict: &str, score: u8, maturity_score: u8) {
    info!(
        event = "gate.assessed",
        verdict = %verdict,
        score = score,
        maturity_score = maturity_score,
    );
}
