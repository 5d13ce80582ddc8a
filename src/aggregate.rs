//! Per-lag aggregation of raw correlation values.
//!
//! Every statistic skips NaN cells; a lag whose cells are all NaN aggregates
//! to NaN across the board.

use crate::significance::SignificanceTester;

/// Total order on `f64` with NaN after every number.
pub fn float_total_cmp(a: &f64, b: &f64) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal),
    }
}

/// Median of a sorted slice; NaN when empty.
pub fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Quantile `p` of a sorted slice, interpolated between neighbouring ranks.
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    if sorted_data.is_empty() {
        return f64::NAN;
    }
    if p <= 0.0 {
        return sorted_data[0];
    }
    if p >= 1.0 {
        return sorted_data[sorted_data.len() - 1];
    }

    let n = sorted_data.len();
    let index = p * (n - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        sorted_data[lower]
    } else {
        let weight = index - lower as f64;
        sorted_data[lower] * (1.0 - weight) + sorted_data[upper] * weight
    }
}

/// Aggregated statistics of one lag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagStatistics {
    /// Mean correlation.
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Median correlation.
    pub median: f64,
    /// 75th minus 25th percentile.
    pub iqr: f64,
    /// Fraction of cells with `r >= r_c`.
    pub pos_significant: f64,
    /// Fraction of cells with `r <= -r_c`.
    pub neg_significant: f64,
    /// Fraction of cells with `|r| >= r_c`.
    pub abs_significant: f64,
}

impl LagStatistics {
    /// All statistics NaN.
    pub const EMPTY: LagStatistics = LagStatistics {
        mean: f64::NAN,
        std_dev: f64::NAN,
        median: f64::NAN,
        iqr: f64::NAN,
        pos_significant: f64::NAN,
        neg_significant: f64::NAN,
        abs_significant: f64::NAN,
    };

    /// Aggregate `values`, ignoring NaN.
    ///
    /// `scratch` is cleared and reused for sorting so the caller can keep one
    /// buffer across lags.
    pub fn from_values(
        values: impl IntoIterator<Item = f64>,
        tester: &SignificanceTester,
        scratch: &mut Vec<f64>,
    ) -> Self {
        scratch.clear();
        scratch.extend(values.into_iter().filter(|v| !v.is_nan()));
        let n = scratch.len();
        if n == 0 {
            return Self::EMPTY;
        }
        let count = n as f64;

        let mean = scratch.iter().sum::<f64>() / count;
        let variance = scratch.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count;

        let mut positive = 0usize;
        let mut negative = 0usize;
        let mut absolute = 0usize;
        for &r in scratch.iter() {
            if tester.significance_test(r) {
                positive += 1;
            }
            if tester.is_significant_negative(r) {
                negative += 1;
            }
            if tester.is_significant(r) {
                absolute += 1;
            }
        }

        scratch.sort_by(float_total_cmp);
        Self {
            mean,
            std_dev: variance.sqrt(),
            median: median_of_sorted(scratch),
            iqr: percentile(scratch, 0.75) - percentile(scratch, 0.25),
            pos_significant: positive as f64 / count,
            neg_significant: negative as f64 / count,
            abs_significant: absolute as f64 / count,
        }
    }
}
