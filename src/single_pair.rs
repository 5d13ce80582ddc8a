//! FFT-backed computation for requests with one series on each side.
//!
//! With a single pair every cell is its own column statistic, so the
//! per-lag dot products of one base window can all be taken from a single
//! cross-correlation: the normalized base window, zero-padded, against the
//! segment of B that covers every lag window. The centered segment keeps the
//! FFT input close to zero mean; the per-lag means are folded back in with
//! `sum(a_norm) * (mean_lag - mean_segment)`. Segments holding NaN are
//! correlated lag by lag instead.

use crate::aggregate::LagStatistics;
use crate::dft::cross_correlation;
use crate::errors::{CorrelogramError, CorrelogramResult};
use crate::matrix::{Column, CorrelationMatrix};
use crate::metadata::{NaAction, WindowMetadata};
use crate::significance::SignificanceTester;
use crate::window_stats::{
    correlation_from_normalized, incremental_mean, mean, normalize_values, summed_squares,
};

/// Compute the matrix of a single-pair request.
///
/// Produces the same columns as the general path up to floating-point
/// rounding of the transform.
pub fn compute_single_pair(metadata: &WindowMetadata) -> CorrelogramResult<CorrelationMatrix> {
    if !metadata.is_single_pair() {
        return Err(CorrelogramError::InvalidParameter {
            parameter: "series set sizes".to_string(),
            value: (metadata.set_a().len() * metadata.set_b().len()) as f64,
            constraint: "exactly one series in each set".to_string(),
        });
    }

    let w = metadata.window_size();
    let na_action = metadata.na_action();
    let series_a = metadata.set_a()[0].as_ref();
    let a = na_action.apply(series_a.y());
    let b = na_action.apply(metadata.set_b()[0].y());
    let x = series_a.x();
    let tester = SignificanceTester::new(w, metadata.significance_level())?;

    let mut matrix = CorrelationMatrix::new(metadata);
    let mut base = vec![0.0; w];
    let mut lag_window = vec![0.0; w];
    let mut scratch = Vec::new();
    let mut previous_mean = f64::NAN;
    let mut previous_from = 0;

    for start in metadata.base_window_starts() {
        let to = start + w - 1;
        let base_mean = incremental_mean(&a, start, to, previous_mean, previous_from);
        previous_mean = base_mean;
        previous_from = start;

        let lags = metadata.lag_range(start);
        let mut column = Column::new(start, x[start], x[to], lags);
        if lags.is_empty() {
            matrix.push_column(column);
            continue;
        }

        normalize_values(&a, start, to, base_mean, &mut base);
        let base_root = summed_squares(&base).sqrt();
        let base_sum: f64 = base.iter().sum();

        let seg_from = (start as i64 + lags.first_tau as i64) as usize;
        let seg_to = (start as i64 + lags.last_tau() as i64) as usize + w - 1;
        let seg_mean = mean(&b, seg_from, seg_to);
        let padded = (seg_to - seg_from + 1).next_power_of_two();

        let mut base_padded = vec![0.0; padded];
        base_padded[..w].copy_from_slice(&base);
        let mut segment = vec![0.0; padded];
        for (dst, &v) in segment.iter_mut().zip(&b[seg_from..=seg_to]) {
            *dst = v - seg_mean;
        }
        // NaN would leak into every lag through the transform.
        let products = (!segment.iter().any(|v| v.is_nan()))
            .then(|| cross_correlation(&base_padded, &segment, NaAction::LeaveUnchanged));

        let mut lag_mean = f64::NAN;
        let mut lag_from = 0;
        for li in 0..lags.count {
            let from = (start as i64 + lags.tau(li) as i64) as usize;
            lag_mean = incremental_mean(&b, from, from + w - 1, lag_mean, lag_from);
            lag_from = from;

            normalize_values(&b, from, from + w - 1, lag_mean, &mut lag_window);
            let lag_root = summed_squares(&lag_window).sqrt();
            let r = match &products {
                Some(products) if base_root * lag_root != 0.0 => {
                    (products[from - seg_from] - base_sum * (lag_mean - seg_mean))
                        / (base_root * lag_root)
                }
                Some(_) => f64::NAN,
                None => correlation_from_normalized(&base, base_root, &lag_window, lag_root),
            };
            column.push(LagStatistics::from_values([r], &tester, &mut scratch));
        }
        matrix.push_column(column);
    }

    Ok(matrix)
}
