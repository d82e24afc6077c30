//! Nearest-rank latency percentiles.

use std::cmp::Ordering;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// p50/p95/p99 over a finite sample set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentileSummary<T> {
    pub p50: T,
    pub p95: T,
    pub p99: T,
    pub count: usize,
}

/// Index of percentile `q` in a sorted slice of length `n > 0`:
/// `round(q / 100 * (n - 1))`, ties to even.
fn nearest_rank_index(n: usize, q: f64) -> usize {
    let idx = ((q / 100.0) * (n - 1) as f64).round_ties_even();
    (idx as usize).min(n - 1)
}

/// Compute p50/p95/p99 of `samples`.
///
/// Empty input yields an all-zero summary. Samples that do not compare
/// with themselves (NaN) are ignored and not counted.
pub fn compute_percentiles<T>(samples: &[T]) -> PercentileSummary<T>
where
    T: Copy + Default + PartialOrd,
{
    #[allow(clippy::eq_op)]
    let mut xs: Vec<T> = samples.iter().copied().filter(|x| x == x).collect();
    if xs.is_empty() {
        return PercentileSummary::default();
    }
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let n = xs.len();
    PercentileSummary {
        p50: xs[nearest_rank_index(n, 50.0)],
        p95: xs[nearest_rank_index(n, 95.0)],
        p99: xs[nearest_rank_index(n, 99.0)],
        count: n,
    }
}

/// Percentiles of wall-clock durations, in whole milliseconds.
pub fn from_durations(durations: &[Duration]) -> PercentileSummary<u64> {
    let ms: Vec<u64> = durations
        .iter()
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .collect();
    compute_percentiles(&ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_all_zero() {
        let s = compute_percentiles::<u64>(&[]);
        assert_eq!(
            s,
            PercentileSummary {
                p50: 0,
                p95: 0,
                p99: 0,
                count: 0
            }
        );
    }

    #[test]
    fn ten_samples() {
        let s = compute_percentiles(&[100u64, 90, 80, 70, 60, 50, 40, 30, 20, 10]);
        // idx = round(0.5 * 9) = 4 (4.5 ties to even), round(8.55) = 9, round(8.91) = 9
        assert_eq!(s.p50, 50);
        assert_eq!(s.p95, 100);
        assert_eq!(s.p99, 100);
        assert_eq!(s.count, 10);
    }

    #[test]
    fn ties_round_to_even() {
        // n = 2: round(0.5) = 0
        let s = compute_percentiles(&[1u32, 2]);
        assert_eq!(s.p50, 1);
        // n = 4: round(1.5) = 2
        let s = compute_percentiles(&[1u32, 2, 3, 4]);
        assert_eq!(s.p50, 3);
    }

    #[test]
    fn single_sample() {
        let s = compute_percentiles(&[42.5f64]);
        assert_eq!((s.p50, s.p95, s.p99, s.count), (42.5, 42.5, 42.5, 1));
    }

    #[test]
    fn nan_samples_are_dropped() {
        let s = compute_percentiles(&[f64::NAN, 3.0, 1.0, 2.0]);
        assert_eq!(s.count, 3);
        assert_eq!(s.p50, 2.0);
    }

    #[test]
    fn monotonic_over_many_shapes() {
        for n in 1..200u64 {
            let samples: Vec<u64> = (0..n).map(|i| (i * 7919) % 1013).collect();
            let s = compute_percentiles(&samples);
            assert!(s.p50 <= s.p95 && s.p95 <= s.p99, "n={n}");
            assert_eq!(s.count, n as usize);
        }
    }

    #[test]
    fn durations_in_millis() {
        let ds: Vec<Duration> = (1..=100).map(Duration::from_millis).collect();
        let s = from_durations(&ds);
        assert_eq!(s.p50, 51);
        assert_eq!(s.p99, 99);
    }
}
