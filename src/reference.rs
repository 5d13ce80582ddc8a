//! Direct, unoptimized correlogram computation.
//!
//! Every cell is computed from scratch with [`correlation_coefficient`], no
//! caches and no threads. Slow, but obviously correct; used to cross-check
//! the parallel path and to recover the raw correlations behind a single
//! matrix cell.

use crate::aggregate::LagStatistics;
use crate::errors::{CorrelogramError, CorrelogramResult};
use crate::matrix::{Column, CorrelationMatrix};
use crate::metadata::WindowMetadata;
use crate::series::NumericSeries;
use crate::significance::SignificanceTester;
use crate::window_stats::correlation_coefficient;
use std::sync::Arc;

fn prepared_sets(metadata: &WindowMetadata) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let na_action = metadata.na_action();
    let prepare = |set: &[Arc<NumericSeries>]| {
        set.iter().map(|s| na_action.apply(s.y())).collect::<Vec<_>>()
    };
    (prepare(metadata.set_a()), prepare(metadata.set_b()))
}

/// Raw correlations of every `(a, b)` pair for the base window at `start`
/// and lag `tau`, in `a`-major order.
fn raw_cells(metadata: &WindowMetadata, a: &[Vec<f64>], b: &[Vec<f64>], start: usize, tau: i32) -> Vec<f64> {
    let to = start + metadata.window_size() - 1;
    let mut cells = Vec::with_capacity(a.len() * b.len());
    for series_a in a {
        for series_b in b {
            cells.push(correlation_coefficient(series_a, series_b, start, to, tau));
        }
    }
    cells
}

/// Compute the full matrix cell by cell.
pub fn compute_matrix(metadata: &WindowMetadata) -> CorrelogramResult<CorrelationMatrix> {
    let (a, b) = prepared_sets(metadata);
    let tester = SignificanceTester::new(metadata.window_size(), metadata.significance_level())?;
    let x = metadata.set_a()[0].x();
    let w = metadata.window_size();

    let mut matrix = CorrelationMatrix::new(metadata);
    let mut scratch = Vec::new();
    for start in metadata.base_window_starts() {
        let lags = metadata.lag_range(start);
        let mut column = Column::new(start, x[start], x[start + w - 1], lags);
        for k in 0..lags.count {
            let cells = raw_cells(metadata, &a, &b, start, lags.tau(k));
            column.push(LagStatistics::from_values(cells, &tester, &mut scratch));
        }
        matrix.push_column(column);
    }
    Ok(matrix)
}

/// Raw correlations behind cell `(column, tau)` of the matrix for
/// `metadata`, one per `(a, b)` pair in `a`-major order.
pub fn raw_distribution(metadata: &WindowMetadata, column: usize, tau: i32) -> CorrelogramResult<Vec<f64>> {
    let total = metadata.base_window_count();
    if column >= total {
        return Err(CorrelogramError::ColumnOutOfRange { index: column, len: total });
    }
    let start = column * metadata.base_window_offset();
    let lags = metadata.lag_range(start);
    let on_grid = !lags.is_empty()
        && tau >= lags.first_tau
        && tau <= lags.last_tau()
        && (tau - lags.first_tau) % lags.step == 0;
    if !on_grid {
        return Err(CorrelogramError::InvalidParameter {
            parameter: "tau".to_string(),
            value: tau as f64,
            constraint: format!(
                "a lag of column {} on the grid {}..={} step {}",
                column,
                lags.first_tau,
                lags.last_tau(),
                lags.step
            ),
        });
    }

    let (a, b) = prepared_sets(metadata);
    Ok(raw_cells(metadata, &a, &b, start, tau))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn metadata() -> WindowMetadata {
        let s = |id, y: Vec<f64>| Arc::new(NumericSeries::from_values(id, y).unwrap());
        WindowMetadata::builder(
            vec![
                s(1, vec![1.0, 2.0, 3.0, 4.0, 4.0, 3.0, 2.0, 1.0]),
                s(2, vec![2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0]),
            ],
            vec![s(3, vec![4.0, 3.0, 2.0, 1.0, 1.0, 2.0, 3.0, 4.0])],
        )
        .window_size(4)
        .lags(-1, 3)
        .tau_step(2)
        .base_window_offset(2)
        .build()
        .unwrap()
    }

    #[test]
    fn test_raw_distribution_order() {
        let md = metadata();
        let raw = raw_distribution(&md, 1, -1).unwrap();
        assert_eq!(raw.len(), 2);
        // Base window [2, 5] of series 1 is 3,4,4,3; lag window [1, 4] of B is 3,2,1,1.
        let a = [3.0, 4.0, 4.0, 3.0];
        let b = [3.0, 2.0, 1.0, 1.0];
        assert_approx_eq!(raw[0], correlation_coefficient(&a, &b, 0, 3, 0), 1e-15);
    }

    #[test]
    fn test_raw_distribution_rejects_bad_cells() {
        let md = metadata();
        assert!(matches!(
            raw_distribution(&md, 3, 1),
            Err(CorrelogramError::ColumnOutOfRange { index: 3, len: 3 })
        ));
        // Column 0 starts at index 0, so lag -1 would leave the series.
        assert!(raw_distribution(&md, 0, -1).is_err());
        assert!(raw_distribution(&md, 1, 0).is_err());
    }

    #[test]
    fn test_column_means_match_raw_cells() {
        let md = metadata();
        let matrix = compute_matrix(&md).unwrap();
        for (i, column) in matrix.columns().iter().enumerate() {
            for k in 0..column.len() {
                let raw = raw_distribution(&md, i, column.lag_at(k)).unwrap();
                let mean = raw.iter().sum::<f64>() / raw.len() as f64;
                assert_approx_eq!(column.mean[k], mean, 1e-15);
            }
        }
    }
}
