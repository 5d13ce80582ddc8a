//! Read-only time series handed to the engine by the owning data model.

use crate::errors::{CorrelogramError, CorrelogramResult};

/// A regularly sampled time series: paired `x` (time) and `y` (value) arrays.
///
/// The identifier is assigned once by whoever loads the series and is what
/// request metadata compares, so two series with equal values but different
/// ids are different inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSeries {
    id: u64,
    x: Vec<f64>,
    y: Vec<f64>,
}

impl NumericSeries {
    /// Create a series from explicit time and value arrays.
    ///
    /// Fails if the arrays differ in length or are empty. `x` is assumed to be
    /// non-decreasing; this is not checked.
    pub fn new(id: u64, x: Vec<f64>, y: Vec<f64>) -> CorrelogramResult<Self> {
        if x.len() != y.len() {
            return Err(CorrelogramError::SeriesLengthMismatch {
                series_id: id,
                expected: x.len(),
                actual: y.len(),
            });
        }
        if y.is_empty() {
            return Err(CorrelogramError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        Ok(Self { id, x, y })
    }

    /// Create a series with `x = 0, 1, 2, ...`.
    pub fn from_values(id: u64, y: Vec<f64>) -> CorrelogramResult<Self> {
        let x = (0..y.len()).map(|i| i as f64).collect();
        Self::new(id, x, y)
    }

    /// Stable identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Time axis.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Values.
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Always false for a constructed series.
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}
