//! Computation request parameters.
//!
//! [`WindowMetadata`] is the immutable description of one correlogram request
//! and the key under which the result store memoizes matrices. Equality and
//! hashing look at series identities and every scalar parameter, never at
//! series contents.

use crate::errors::{validate_open_interval, CorrelogramError, CorrelogramResult};
use crate::series::NumericSeries;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What to do with NaN samples before they reach a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NaAction {
    /// Replace NaN with 0.0.
    ReplaceWithZero,
    /// Let NaN propagate; affected correlations become NaN and are skipped
    /// during aggregation.
    #[default]
    LeaveUnchanged,
}

impl NaAction {
    /// Apply the action to a copy of `values`.
    pub fn apply(self, values: &[f64]) -> Vec<f64> {
        match self {
            NaAction::LeaveUnchanged => values.to_vec(),
            NaAction::ReplaceWithZero => values
                .iter()
                .map(|&v| if v.is_nan() { 0.0 } else { v })
                .collect(),
        }
    }
}

/// Lags that are valid for one base window.
///
/// Lags lie on the grid `tau_min + k * tau_step` of the request; the range
/// keeps only those whose lag window stays inside the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LagRange {
    /// First valid lag.
    pub first_tau: i32,
    /// Number of valid lags.
    pub count: usize,
    /// Distance between consecutive lags.
    pub step: i32,
}

impl LagRange {
    /// Lag at offset `k`.
    pub fn tau(&self, k: usize) -> i32 {
        self.first_tau + k as i32 * self.step
    }

    /// Last valid lag. Only meaningful when `count > 0`.
    pub fn last_tau(&self) -> i32 {
        self.tau(self.count.saturating_sub(1))
    }

    /// True if no lag fits.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Immutable correlogram request.
#[derive(Debug, Clone)]
pub struct WindowMetadata {
    set_a: Vec<Arc<NumericSeries>>,
    set_b: Vec<Arc<NumericSeries>>,
    window_size: usize,
    tau_min: i32,
    tau_max: i32,
    tau_step: i32,
    base_window_offset: usize,
    significance_level: f64,
    na_action: NaAction,
}

/// Builder for [`WindowMetadata`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct WindowMetadataBuilder {
    set_a: Vec<Arc<NumericSeries>>,
    set_b: Vec<Arc<NumericSeries>>,
    window_size: usize,
    tau_min: i32,
    tau_max: i32,
    tau_step: i32,
    base_window_offset: usize,
    significance_level: f64,
    na_action: NaAction,
}

impl WindowMetadataBuilder {
    /// Window length in samples (at least 2).
    pub fn window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Inclusive lag range.
    pub fn lags(mut self, tau_min: i32, tau_max: i32) -> Self {
        self.tau_min = tau_min;
        self.tau_max = tau_max;
        self
    }

    /// Distance between evaluated lags (at least 1).
    pub fn tau_step(mut self, tau_step: i32) -> Self {
        self.tau_step = tau_step;
        self
    }

    /// Distance between consecutive base windows (at least 1).
    pub fn base_window_offset(mut self, offset: usize) -> Self {
        self.base_window_offset = offset;
        self
    }

    /// Significance level in `(0, 1)`.
    pub fn significance_level(mut self, level: f64) -> Self {
        self.significance_level = level;
        self
    }

    /// NaN handling.
    pub fn na_action(mut self, action: NaAction) -> Self {
        self.na_action = action;
        self
    }

    /// Validate and freeze the request.
    pub fn build(self) -> CorrelogramResult<WindowMetadata> {
        if self.window_size < 2 {
            return Err(CorrelogramError::InvalidParameter {
                parameter: "window_size".to_string(),
                value: self.window_size as f64,
                constraint: "must be >= 2".to_string(),
            });
        }
        if self.tau_min > self.tau_max {
            return Err(CorrelogramError::InvalidParameter {
                parameter: "tau_min".to_string(),
                value: self.tau_min as f64,
                constraint: format!("must be <= tau_max ({})", self.tau_max),
            });
        }
        if self.tau_step < 1 {
            return Err(CorrelogramError::InvalidParameter {
                parameter: "tau_step".to_string(),
                value: self.tau_step as f64,
                constraint: "must be >= 1".to_string(),
            });
        }
        if self.base_window_offset < 1 {
            return Err(CorrelogramError::InvalidParameter {
                parameter: "base_window_offset".to_string(),
                value: self.base_window_offset as f64,
                constraint: "must be >= 1".to_string(),
            });
        }
        validate_open_interval(self.significance_level, 0.0, 1.0, "significance_level")?;

        if self.set_a.is_empty() {
            return Err(CorrelogramError::EmptySeriesSet {
                set: "A".to_string(),
            });
        }
        if self.set_b.is_empty() {
            return Err(CorrelogramError::EmptySeriesSet {
                set: "B".to_string(),
            });
        }
        let expected = self.set_a[0].len();
        for series in self.set_a.iter().chain(&self.set_b) {
            if series.len() != expected {
                return Err(CorrelogramError::SeriesLengthMismatch {
                    series_id: series.id(),
                    expected,
                    actual: series.len(),
                });
            }
        }

        Ok(WindowMetadata {
            set_a: self.set_a,
            set_b: self.set_b,
            window_size: self.window_size,
            tau_min: self.tau_min,
            tau_max: self.tau_max,
            tau_step: self.tau_step,
            base_window_offset: self.base_window_offset,
            significance_level: self.significance_level,
            na_action: self.na_action,
        })
    }
}

impl WindowMetadata {
    /// Start a request over the two series sets.
    ///
    /// Defaults: window size 2, lags `[0, 0]`, step 1, offset 1, significance
    /// level 0.05, NaN left unchanged.
    pub fn builder(
        set_a: Vec<Arc<NumericSeries>>,
        set_b: Vec<Arc<NumericSeries>>,
    ) -> WindowMetadataBuilder {
        WindowMetadataBuilder {
            set_a,
            set_b,
            window_size: 2,
            tau_min: 0,
            tau_max: 0,
            tau_step: 1,
            base_window_offset: 1,
            significance_level: 0.05,
            na_action: NaAction::default(),
        }
    }

    /// Reference set.
    pub fn set_a(&self) -> &[Arc<NumericSeries>] {
        &self.set_a
    }

    /// Lagged set.
    pub fn set_b(&self) -> &[Arc<NumericSeries>] {
        &self.set_b
    }

    /// Window length.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Smallest requested lag.
    pub fn tau_min(&self) -> i32 {
        self.tau_min
    }

    /// Largest requested lag.
    pub fn tau_max(&self) -> i32 {
        self.tau_max
    }

    /// Lag step.
    pub fn tau_step(&self) -> i32 {
        self.tau_step
    }

    /// Base window stride.
    pub fn base_window_offset(&self) -> usize {
        self.base_window_offset
    }

    /// Significance level.
    pub fn significance_level(&self) -> f64 {
        self.significance_level
    }

    /// NaN handling.
    pub fn na_action(&self) -> NaAction {
        self.na_action
    }

    /// Length shared by every series in the request.
    pub fn series_length(&self) -> usize {
        self.set_a[0].len()
    }

    /// True when both sets hold exactly one series.
    pub fn is_single_pair(&self) -> bool {
        self.set_a.len() == 1 && self.set_b.len() == 1
    }

    /// Capacity of each lag-window ring buffer.
    ///
    /// The lag span, capped at the number of windows that fit into a series;
    /// never zero.
    pub fn cache_size(&self) -> usize {
        let span = self.tau_max as i64 - self.tau_min as i64 + 1;
        let n = self.series_length() as i64;
        let fitting = n - self.window_size as i64 + 1;
        span.min(fitting).max(1) as usize
    }

    /// Number of lags on the full (unclamped) grid.
    pub fn lag_count(&self) -> usize {
        ((self.tau_max as i64 - self.tau_min as i64) / self.tau_step as i64 + 1) as usize
    }

    /// Largest number of valid lags of any base window.
    pub fn max_valid_lag_count(&self) -> usize {
        self.base_window_starts()
            .map(|start| self.lag_range(start).count)
            .max()
            .unwrap_or(0)
    }

    /// Number of base windows that fit into the series.
    pub fn base_window_count(&self) -> usize {
        let n = self.series_length();
        if self.window_size > n {
            0
        } else {
            (n - self.window_size) / self.base_window_offset + 1
        }
    }

    /// Start indices of all base windows, in computation order.
    pub fn base_window_starts(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.base_window_count()).map(move |k| k * self.base_window_offset)
    }

    /// Valid lag grid for the base window starting at `start`.
    pub fn lag_range(&self, start: usize) -> LagRange {
        let n = self.series_length() as i64;
        let w = self.window_size as i64;
        let start = start as i64;
        let (tau_min, tau_max, step) = (
            self.tau_min as i64,
            self.tau_max as i64,
            self.tau_step as i64,
        );

        let lo = tau_min.max(-start);
        let hi = tau_max.min(n - w - start);
        let empty = LagRange {
            first_tau: self.tau_min,
            count: 0,
            step: self.tau_step,
        };
        if hi < lo {
            return empty;
        }
        let first_k = (lo - tau_min + step - 1) / step;
        let last_k = (hi - tau_min) / step;
        if last_k < first_k {
            return empty;
        }
        LagRange {
            first_tau: (tau_min + first_k * step) as i32,
            count: (last_k - first_k + 1) as usize,
            step: self.tau_step,
        }
    }
}

impl PartialEq for WindowMetadata {
    fn eq(&self, other: &Self) -> bool {
        let same_ids = |a: &[Arc<NumericSeries>], b: &[Arc<NumericSeries>]| {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.id() == y.id())
        };
        same_ids(&self.set_a, &other.set_a)
            && same_ids(&self.set_b, &other.set_b)
            && self.window_size == other.window_size
            && self.tau_min == other.tau_min
            && self.tau_max == other.tau_max
            && self.tau_step == other.tau_step
            && self.base_window_offset == other.base_window_offset
            && self.significance_level.to_bits() == other.significance_level.to_bits()
            && self.na_action == other.na_action
    }
}

impl Eq for WindowMetadata {}

impl Hash for WindowMetadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.set_a.len().hash(state);
        for s in &self.set_a {
            s.id().hash(state);
        }
        self.set_b.len().hash(state);
        for s in &self.set_b {
            s.id().hash(state);
        }
        self.window_size.hash(state);
        self.tau_min.hash(state);
        self.tau_max.hash(state);
        self.tau_step.hash(state);
        self.base_window_offset.hash(state);
        self.significance_level.to_bits().hash(state);
        self.na_action.hash(state);
    }
}
