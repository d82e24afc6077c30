//! Statistical drift analyzer.
//!
//! Compares a baseline record set against a current one:
//! - numeric fields: z-score of the mean shift against the baseline's
//!   population standard deviation
//! - categorical fields: L1 distance between normalized frequency
//!   distributions over the union of observed categories
//!
//! [`compute_drift`] is the pure computation. [`DriftAnalyzer`] stamps the
//! result with an id and timestamp and appends it to a bounded
//! [`HistoryLog`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use qgate_state::{HistoryLog, MemoryHistoryLog};
use serde::{Deserialize, Serialize};

use crate::domain::{Result, Scalar};
use crate::obs;

/// Number of reports kept in history.
pub const DRIFT_HISTORY_CAPACITY: usize = 200;

/// Default page size for [`DriftAnalyzer::list_reports`].
pub const DEFAULT_REPORT_LIMIT: usize = 20;

/// One row of a data set under analysis.
pub type Record = BTreeMap<String, Scalar>;

/// Drift thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftThresholds {
    /// Numeric drift when `z_score >= z_score`.
    pub z_score: f64,
    /// Categorical drift when `frequency_shift_l1 >= l1`.
    pub l1: f64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            z_score: 2.0,
            l1: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericDrift {
    pub baseline: NumericStats,
    pub current: NumericStats,
    pub mean_shift: f64,
    pub z_score: f64,
    pub drift: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalDrift {
    pub baseline: BTreeMap<String, f64>,
    pub current: BTreeMap<String, f64>,
    pub frequency_shift_l1: f64,
    pub drift: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftSummary {
    pub numeric_drift_fields: Vec<String>,
    pub categorical_drift_fields: Vec<String>,
}

/// Result of comparing two record sets, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftAnalysis {
    pub summary: DriftSummary,
    pub numeric: BTreeMap<String, NumericDrift>,
    pub categorical: BTreeMap<String, CategoricalDrift>,
    /// True iff no field drifted.
    pub ok: bool,
}

/// Persisted drift report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub summary: DriftSummary,
    pub numeric: BTreeMap<String, NumericDrift>,
    pub categorical: BTreeMap<String, CategoricalDrift>,
    pub ok: bool,
}

impl DriftReport {
    fn stamp(analysis: DriftAnalysis, created_at: DateTime<Utc>) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("drift-{}-{}", created_at.format("%Y%m%d%H%M%S"), &suffix[..8]),
            created_at,
            summary: analysis.summary,
            numeric: analysis.numeric,
            categorical: analysis.categorical,
            ok: analysis.ok,
        }
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

/// Population standard deviation; 0 with fewer than two samples.
fn population_std(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

/// Finite numeric values of `field`; NaN and infinities are skipped.
fn numeric_values(records: &[Record], field: &str) -> Vec<f64> {
    records
        .iter()
        .filter_map(|r| r.get(field))
        .filter_map(Scalar::as_f64)
        .filter(|x| x.is_finite())
        .collect()
}

/// Category label of a value. Integral floats keep a fractional digit so
/// `1` and `1.0` stay distinct categories.
fn category_key(value: &Scalar) -> String {
    match value {
        Scalar::Float(x) if x.is_finite() && x.fract() == 0.0 => format!("{x:.1}"),
        other => other.to_string(),
    }
}

fn category_counts(records: &[Record], field: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for value in records.iter().filter_map(|r| r.get(field)) {
        if !value.is_null() {
            *counts.entry(category_key(value)).or_insert(0) += 1;
        }
    }
    counts
}

fn numeric_drift(baseline: &[f64], current: &[f64], thresholds: &DriftThresholds) -> NumericDrift {
    let (bm, bs) = (mean(baseline), population_std(baseline));
    let (cm, cs) = (mean(current), population_std(current));
    let z = if bs == 0.0 { 0.0 } else { (cm - bm).abs() / bs };

    NumericDrift {
        baseline: NumericStats {
            mean: round4(bm),
            std: round4(bs),
            count: baseline.len(),
        },
        current: NumericStats {
            mean: round4(cm),
            std: round4(cs),
            count: current.len(),
        },
        mean_shift: round4(cm - bm),
        z_score: round4(z),
        drift: z >= thresholds.z_score,
    }
}

fn categorical_drift(
    baseline: &BTreeMap<String, usize>,
    current: &BTreeMap<String, usize>,
    thresholds: &DriftThresholds,
) -> CategoricalDrift {
    let keys: BTreeSet<&String> = baseline.keys().chain(current.keys()).collect();
    let bt = baseline.values().sum::<usize>().max(1) as f64;
    let ct = current.values().sum::<usize>().max(1) as f64;

    let freq = |counts: &BTreeMap<String, usize>, k: &str, total: f64| {
        counts.get(k).copied().unwrap_or(0) as f64 / total
    };

    let mut l1 = 0.0;
    let mut base_freq = BTreeMap::new();
    let mut cur_freq = BTreeMap::new();
    for k in keys {
        let b = freq(baseline, k.as_str(), bt);
        let c = freq(current, k.as_str(), ct);
        l1 += (b - c).abs();
        base_freq.insert(k.clone(), round4(b));
        cur_freq.insert(k.clone(), round4(c));
    }

    CategoricalDrift {
        baseline: base_freq,
        current: cur_freq,
        frequency_shift_l1: round4(l1),
        drift: l1 >= thresholds.l1,
    }
}

/// Compare `current` against `baseline` on the declared fields.
pub fn compute_drift<N: AsRef<str>, C: AsRef<str>>(
    baseline: &[Record],
    current: &[Record],
    numeric_fields: &[N],
    categorical_fields: &[C],
    thresholds: &DriftThresholds,
) -> DriftAnalysis {
    let mut numeric = BTreeMap::new();
    let mut categorical = BTreeMap::new();
    let mut summary = DriftSummary::default();

    for field in numeric_fields.iter().map(|f| f.as_ref()) {
        let d = numeric_drift(
            &numeric_values(baseline, field),
            &numeric_values(current, field),
            thresholds,
        );
        if d.drift {
            summary.numeric_drift_fields.push(field.to_string());
        }
        numeric.insert(field.to_string(), d);
    }

    for field in categorical_fields.iter().map(|f| f.as_ref()) {
        let d = categorical_drift(
            &category_counts(baseline, field),
            &category_counts(current, field),
            thresholds,
        );
        if d.drift {
            summary.categorical_drift_fields.push(field.to_string());
        }
        categorical.insert(field.to_string(), d);
    }

    let ok = summary.numeric_drift_fields.is_empty() && summary.categorical_drift_fields.is_empty();
    DriftAnalysis {
        summary,
        numeric,
        categorical,
        ok,
    }
}

/// Drift analyzer with persisted report history.
#[derive(Clone)]
pub struct DriftAnalyzer {
    log: Arc<dyn HistoryLog<DriftReport>>,
    thresholds: DriftThresholds,
}

impl DriftAnalyzer {
    pub fn new(log: Arc<dyn HistoryLog<DriftReport>>, thresholds: DriftThresholds) -> Self {
        Self { log, thresholds }
    }

    /// Analyzer with an in-memory history and default thresholds.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryHistoryLog::new()), DriftThresholds::default())
    }

    pub fn thresholds(&self) -> &DriftThresholds {
        &self.thresholds
    }

    /// Analyze and persist a report, returning it.
    pub fn analyze<N: AsRef<str>, C: AsRef<str>>(
        &self,
        baseline: &[Record],
        current: &[Record],
        numeric_fields: &[N],
        categorical_fields: &[C],
    ) -> Result<DriftReport> {
        let analysis = compute_drift(
            baseline,
            current,
            numeric_fields,
            categorical_fields,
            &self.thresholds,
        );
        let report = DriftReport::stamp(analysis, Utc::now());
        self.log.append(report.clone(), DRIFT_HISTORY_CAPACITY)?;

        let drifted =
            report.summary.numeric_drift_fields.len() + report.summary.categorical_drift_fields.len();
        obs::emit_drift_report(&report.id, report.ok, drifted);
        Ok(report)
    }

    /// Persisted reports, most recent first. `None` uses the default limit.
    pub fn list_reports(&self, limit: Option<usize>) -> Result<Vec<DriftReport>> {
        Ok(self.log.list(Some(limit.unwrap_or(DEFAULT_REPORT_LIMIT)))?)
    }
}
