//! Error types and validation functions for correlogram computation.
//!
//! Request-level problems (bad window parameters, empty or ragged series sets,
//! cancellation, worker failure) are reported through [`CorrelogramError`].
//! Internal contract violations such as a non-contiguous cache append are
//! programmer errors and panic instead.

use thiserror::Error;

/// Error types for correlogram operations.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CorrelogramError {
    /// Insufficient data for the requested computation.
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData {
        /// Minimum required data points
        required: usize,
        /// Actual number of data points provided
        actual: usize,
    },

    /// Invalid parameter value in a computation request.
    #[error("Invalid parameter: {parameter} = {value}, expected {constraint}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value provided
        value: f64,
        /// Valid range or constraint description
        constraint: String,
    },

    /// A series set that must contain at least one series is empty.
    #[error("Series set {set} is empty")]
    EmptySeriesSet {
        /// Name of the offending set ("A" or "B")
        set: String,
    },

    /// Not all series in a request share the same length.
    #[error("Series {series_id} has length {actual}, expected {expected}")]
    SeriesLengthMismatch {
        /// Identifier of the offending series
        series_id: u64,
        /// Length shared by the other series
        expected: usize,
        /// Length of the offending series
        actual: usize,
    },

    /// The computation was cancelled between two base windows.
    #[error("Computation cancelled after {completed_columns} columns")]
    Cancelled {
        /// Columns that were aggregated before cancellation was observed
        completed_columns: usize,
    },

    /// A worker thread failed and the phase barrier was broken.
    #[error("Worker failed: {reason}")]
    WorkerFailed {
        /// Panic message or barrier failure description
        reason: String,
    },

    /// Requested column does not exist in the matrix.
    #[error("Column {index} out of range, matrix has {len} columns")]
    ColumnOutOfRange {
        /// Requested column index
        index: usize,
        /// Number of columns in the matrix
        len: usize,
    },

    /// Numerical computation could not be carried out.
    #[error("Numerical computation failed: {reason}")]
    NumericalError {
        /// Detailed reason for the failure
        reason: String,
    },
}

/// Result type for correlogram operations.
pub type CorrelogramResult<T> = Result<T, CorrelogramError>;

/// Validates that a parameter is within expected bounds (inclusive).
///
/// # Example
/// ```rust
/// use lagged_correlogram::errors::validate_parameter;
///
/// assert!(validate_parameter(0.05, 0.0, 1.0, "significance_level").is_ok());
/// assert!(validate_parameter(1.5, 0.0, 1.0, "significance_level").is_err());
/// ```
pub fn validate_parameter(value: f64, min: f64, max: f64, name: &str) -> CorrelogramResult<()> {
    if value.is_nan() {
        return Err(CorrelogramError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: "must not be NaN".to_string(),
        });
    }

    if min.is_nan() || max.is_nan() || min > max {
        return Err(CorrelogramError::NumericalError {
            reason: format!(
                "Invalid bounds for parameter {}: min={}, max={}",
                name, min, max
            ),
        });
    }

    if value < min || value > max {
        Err(CorrelogramError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: format!("[{}, {}]", min, max),
        })
    } else {
        Ok(())
    }
}

/// Validates an open interval `(min, max)`.
pub fn validate_open_interval(value: f64, min: f64, max: f64, name: &str) -> CorrelogramResult<()> {
    validate_parameter(value, min, max, name)?;
    if value == min || value == max {
        return Err(CorrelogramError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: format!("({}, {})", min, max),
        });
    }
    Ok(())
}

/// Validate memory allocation size to prevent runaway buffers.
///
/// The cell buffer of a computation grows with `|lags| * |A| * |B|`; a
/// mistyped lag range can otherwise request many gigabytes at once.
///
/// # Example
/// ```rust
/// use lagged_correlogram::errors::validate_allocation_size;
///
/// assert!(validate_allocation_size(1000, "test").is_ok());
/// assert!(validate_allocation_size(usize::MAX, "test").is_err());
/// ```
pub fn validate_allocation_size(size: usize, operation: &str) -> CorrelogramResult<()> {
    // 4 GiB
    const MAX_SAFE_ALLOCATION: usize = 1 << 32;

    if size > MAX_SAFE_ALLOCATION {
        return Err(CorrelogramError::NumericalError {
            reason: format!(
                "Attempted allocation of {} bytes ({:.2} GB) in '{}' exceeds safety limit of {} bytes",
                size,
                size as f64 / (1024.0 * 1024.0 * 1024.0),
                operation,
                MAX_SAFE_ALLOCATION
            ),
        });
    }

    if size >= (1 << 30) {
        log::warn!(
            "Large allocation of {:.2} GB requested in '{}'",
            size as f64 / (1024.0 * 1024.0 * 1024.0),
            operation
        );
    }

    Ok(())
}
