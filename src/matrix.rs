//! Correlogram result matrix.
//!
//! A [`CorrelationMatrix`] is a sequence of [`Column`]s, one per base window,
//! in increasing order of window start. Each column holds seven parallel
//! arrays indexed by lag offset `k`, where the lag is
//! `tau = column.tau_min + k * tau_step`. Columns near the series edges carry
//! fewer lags than the full grid because their lag windows would leave the
//! series.

use crate::aggregate::LagStatistics;
use crate::errors::{CorrelogramError, CorrelogramResult};
use crate::metadata::{LagRange, WindowMetadata};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-lag statistic stored in every column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Statistic {
    /// Mean correlation.
    Mean,
    /// Population standard deviation of the correlations.
    StdDev,
    /// Median correlation.
    Median,
    /// Interquartile range.
    Iqr,
    /// Fraction of significantly positive correlations.
    PositiveSignificant,
    /// Fraction of significantly negative correlations.
    NegativeSignificant,
    /// Fraction of significant correlations of either sign.
    AbsoluteSignificant,
}

impl Statistic {
    /// Every statistic, in storage order.
    pub const ALL: [Statistic; 7] = [
        Statistic::Mean,
        Statistic::StdDev,
        Statistic::Median,
        Statistic::Iqr,
        Statistic::PositiveSignificant,
        Statistic::NegativeSignificant,
        Statistic::AbsoluteSignificant,
    ];

    /// Short lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::StdDev => "std_dev",
            Statistic::Median => "median",
            Statistic::Iqr => "iqr",
            Statistic::PositiveSignificant => "pos_significant",
            Statistic::NegativeSignificant => "neg_significant",
            Statistic::AbsoluteSignificant => "abs_significant",
        }
    }
}

/// Aggregated correlations of one base window.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Column {
    /// Index of the first sample of the base window.
    pub window_start_index: usize,
    /// X value of the first sample of the base window.
    pub window_start_x: f64,
    /// X value of the last sample of the base window.
    pub window_end_x: f64,
    /// Lag of offset 0.
    pub tau_min: i32,
    /// Distance between consecutive lags.
    pub tau_step: i32,
    /// Mean per lag.
    pub mean: Vec<f64>,
    /// Population standard deviation per lag.
    pub std_dev: Vec<f64>,
    /// Median per lag.
    pub median: Vec<f64>,
    /// Interquartile range per lag.
    pub iqr: Vec<f64>,
    /// Fraction of cells with `r >= r_c` per lag.
    pub pos_significant: Vec<f64>,
    /// Fraction of cells with `r <= -r_c` per lag.
    pub neg_significant: Vec<f64>,
    /// Fraction of cells with `|r| >= r_c` per lag.
    pub abs_significant: Vec<f64>,
}

impl Column {
    /// Empty column for a base window, sized for the lags in `lags`.
    pub fn new(window_start_index: usize, window_start_x: f64, window_end_x: f64, lags: LagRange) -> Self {
        let n = lags.count;
        Self {
            window_start_index,
            window_start_x,
            window_end_x,
            tau_min: lags.first_tau,
            tau_step: lags.step,
            mean: Vec::with_capacity(n),
            std_dev: Vec::with_capacity(n),
            median: Vec::with_capacity(n),
            iqr: Vec::with_capacity(n),
            pos_significant: Vec::with_capacity(n),
            neg_significant: Vec::with_capacity(n),
            abs_significant: Vec::with_capacity(n),
        }
    }

    /// Append the statistics of the next lag.
    pub fn push(&mut self, stats: LagStatistics) {
        self.mean.push(stats.mean);
        self.std_dev.push(stats.std_dev);
        self.median.push(stats.median);
        self.iqr.push(stats.iqr);
        self.pos_significant.push(stats.pos_significant);
        self.neg_significant.push(stats.neg_significant);
        self.abs_significant.push(stats.abs_significant);
    }

    /// Number of lags.
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    /// True if no lag was valid for this base window.
    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Values of one statistic, indexed by lag offset.
    pub fn values(&self, stat: Statistic) -> &[f64] {
        match stat {
            Statistic::Mean => &self.mean,
            Statistic::StdDev => &self.std_dev,
            Statistic::Median => &self.median,
            Statistic::Iqr => &self.iqr,
            Statistic::PositiveSignificant => &self.pos_significant,
            Statistic::NegativeSignificant => &self.neg_significant,
            Statistic::AbsoluteSignificant => &self.abs_significant,
        }
    }

    /// Lag at offset `k`.
    pub fn lag_at(&self, k: usize) -> i32 {
        self.tau_min + k as i32 * self.tau_step
    }

    /// Offset of lag `tau`, if the column holds it.
    pub fn index_of_lag(&self, tau: i32) -> Option<usize> {
        let delta = tau as i64 - self.tau_min as i64;
        let step = self.tau_step as i64;
        if delta < 0 || delta % step != 0 {
            return None;
        }
        let k = (delta / step) as usize;
        (k < self.len()).then_some(k)
    }

    /// Last lag of the column, if any.
    pub fn last_lag(&self) -> Option<i32> {
        (!self.is_empty()).then(|| self.lag_at(self.len() - 1))
    }
}

/// Columns of one computation plus the request parameters that shaped them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CorrelationMatrix {
    window_size: usize,
    tau_min: i32,
    tau_max: i32,
    tau_step: i32,
    base_window_offset: usize,
    significance_level: f64,
    columns: Vec<Column>,
}

impl CorrelationMatrix {
    /// Empty matrix for `metadata`.
    pub fn new(metadata: &WindowMetadata) -> Self {
        Self {
            window_size: metadata.window_size(),
            tau_min: metadata.tau_min(),
            tau_max: metadata.tau_max(),
            tau_step: metadata.tau_step(),
            base_window_offset: metadata.base_window_offset(),
            significance_level: metadata.significance_level(),
            columns: Vec::with_capacity(metadata.base_window_count()),
        }
    }

    /// Append the next column.
    ///
    /// # Panics
    /// If the column does not start after the previous one.
    pub fn push_column(&mut self, column: Column) {
        if let Some(last) = self.columns.last() {
            assert!(
                column.window_start_index > last.window_start_index,
                "columns must be appended in increasing window order"
            );
        }
        self.columns.push(column);
    }

    /// All columns in window order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column `index`.
    pub fn column(&self, index: usize) -> CorrelogramResult<&Column> {
        self.columns
            .get(index)
            .ok_or(CorrelogramError::ColumnOutOfRange {
                index,
                len: self.columns.len(),
            })
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True if no base window fit into the series.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Base window width.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Lag step of the request.
    pub fn tau_step(&self) -> i32 {
        self.tau_step
    }

    /// Distance between base window starts.
    pub fn base_window_offset(&self) -> usize {
        self.base_window_offset
    }

    /// Significance level the fractions were computed at.
    pub fn significance_level(&self) -> f64 {
        self.significance_level
    }

    /// Smallest value of `stat` over all cells, ignoring NaN.
    ///
    /// NaN if every cell is NaN or the matrix is empty.
    pub fn min(&self, stat: Statistic) -> f64 {
        self.fold_values(stat, f64::min)
    }

    /// Largest value of `stat` over all cells, ignoring NaN.
    pub fn max(&self, stat: Statistic) -> f64 {
        self.fold_values(stat, f64::max)
    }

    fn fold_values(&self, stat: Statistic, pick: fn(f64, f64) -> f64) -> f64 {
        self.columns
            .iter()
            .flat_map(|c| c.values(stat).iter().copied())
            .filter(|v| !v.is_nan())
            .reduce(pick)
            .unwrap_or(f64::NAN)
    }

    /// Smallest lag present in any column, or the requested minimum when
    /// the matrix holds no lag at all.
    pub fn min_lag(&self) -> i32 {
        self.columns
            .iter()
            .filter(|c| !c.is_empty())
            .map(|c| c.tau_min)
            .min()
            .unwrap_or(self.tau_min)
    }

    /// Largest lag present in any column, or the requested maximum when the
    /// matrix holds no lag at all.
    pub fn max_lag(&self) -> i32 {
        self.columns
            .iter()
            .filter_map(Column::last_lag)
            .max()
            .unwrap_or(self.tau_max)
    }

    /// X value where the first base window starts.
    pub fn start_x_value(&self) -> Option<f64> {
        self.columns.first().map(|c| c.window_start_x)
    }

    /// X value where the last base window ends.
    pub fn end_x_value(&self) -> Option<f64> {
        self.columns.last().map(|c| c.window_end_x)
    }

    /// Series index where the first base window starts; 0 when empty.
    pub fn start_offset_in_time_series(&self) -> usize {
        self.columns.first().map_or(0, |c| c.window_start_index)
    }

    /// Series index where the last base window ends; 0 when empty.
    pub fn end_offset_in_time_series(&self) -> usize {
        self.columns
            .last()
            .map_or(0, |c| c.window_start_index + self.window_size - 1)
    }
}
