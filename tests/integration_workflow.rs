//! Integration tests for full correlogram workflows
//!
//! These tests check the parallel computation against the cell-by-cell
//! reference implementation on fixed fixtures and seeded random ensembles,
//! and exercise the store the way a dataset owner would.

use assert_approx_eq::assert_approx_eq;
use lagged_correlogram::reference::compute_matrix;
use lagged_correlogram::{
    ComputeConfig, CorrelationMatrix, CorrelogramStore, MatrixComputation, NaAction,
    NumericSeries, Statistic, WindowMetadata,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn assert_matrices_close(actual: &CorrelationMatrix, expected: &CorrelationMatrix, tolerance: f64) {
    assert_eq!(actual.len(), expected.len(), "column count differs");
    for (i, (a, e)) in actual.columns().iter().zip(expected.columns()).enumerate() {
        assert_eq!(a.window_start_index, e.window_start_index);
        assert_eq!(a.tau_min, e.tau_min, "column {}", i);
        assert_eq!(a.len(), e.len(), "lag count of column {}", i);
        for stat in Statistic::ALL {
            for (k, (x, y)) in a.values(stat).iter().zip(e.values(stat)).enumerate() {
                if y.is_nan() {
                    assert!(x.is_nan(), "{} column {} lag {}: {} vs NaN", stat.name(), i, k, x);
                } else {
                    assert!(
                        (x - y).abs() <= tolerance,
                        "{} column {} lag {}: {} vs {}",
                        stat.name(),
                        i,
                        k,
                        x,
                        y
                    );
                }
            }
        }
    }
}

fn random_set(rng: &mut StdRng, first_id: u64, count: usize, length: usize) -> Vec<Arc<NumericSeries>> {
    (0..count)
        .map(|i| {
            let mut level = 0.0;
            let y = (0..length)
                .map(|_| {
                    level += rng.gen_range(-1.0..1.0);
                    level + rng.gen_range(-0.5..0.5)
                })
                .collect();
            Arc::new(NumericSeries::from_values(first_id + i as u64, y).unwrap())
        })
        .collect()
}

/// Test scenario: the small hand-checked fixture
///
/// A rises then falls, B is its mirror image; windows of 4 with offset 2 and
/// lags -1..3 step 2 exercise clamping at both series ends.
#[test]
fn test_fixture_matches_reference() {
    let a = NumericSeries::from_values(1, vec![1.0, 2.0, 3.0, 4.0, 4.0, 3.0, 2.0, 1.0]).unwrap();
    let b = NumericSeries::from_values(2, vec![4.0, 3.0, 2.0, 1.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
    let metadata = WindowMetadata::builder(vec![Arc::new(a)], vec![Arc::new(b)])
        .window_size(4)
        .lags(-1, 3)
        .tau_step(2)
        .base_window_offset(2)
        .build()
        .unwrap();

    let expected = compute_matrix(&metadata).unwrap();
    let config = ComputeConfig {
        single_pair_fft: false,
        ..ComputeConfig::default()
    };
    let actual = MatrixComputation::new(metadata.clone(), config).run(&()).unwrap();
    assert_matrices_close(&actual, &expected, 1e-14);

    let lags: Vec<(i32, usize)> = actual.columns().iter().map(|c| (c.tau_min, c.len())).collect();
    assert_eq!(lags, vec![(1, 2), (-1, 2), (-1, 1)]);
    assert_eq!(actual.min_lag(), -1);
    assert_eq!(actual.max_lag(), 3);
    assert_eq!(actual.start_x_value(), Some(0.0));
    assert_eq!(actual.end_x_value(), Some(7.0));

    // The FFT single-pair path agrees too.
    let store = CorrelogramStore::new();
    assert_matrices_close(&store.get_result(&metadata).unwrap(), &expected, 1e-9);
}

/// Test scenario: seeded 50 x 50 ensembles of length 100
///
/// The parallel path must reproduce the reference for every statistic.
#[test]
fn test_random_ensembles_match_reference() {
    let mut rng = StdRng::seed_from_u64(42);
    for (seed_round, (w, tau_min, tau_max, step, offset)) in
        [(20, -5, 5, 1, 10), (16, -12, 7, 3, 7), (33, 0, 10, 2, 9)].into_iter().enumerate()
    {
        let set_a = random_set(&mut rng, 0, 50, 100);
        let set_b = random_set(&mut rng, 1000, 50, 100);
        let metadata = WindowMetadata::builder(set_a, set_b)
            .window_size(w)
            .lags(tau_min, tau_max)
            .tau_step(step)
            .base_window_offset(offset)
            .significance_level(0.05)
            .build()
            .unwrap();

        let expected = compute_matrix(&metadata).unwrap();
        let actual = MatrixComputation::new(metadata, ComputeConfig::default())
            .run(&())
            .unwrap();
        assert!(!actual.is_empty(), "round {}", seed_round);
        assert_matrices_close(&actual, &expected, 1e-14);
    }
}

/// Test scenario: lag range far wider than the series
///
/// Only the clamped lags are ever materialized, so the request runs in the
/// memory of its valid lags and matches the reference.
#[test]
fn test_wide_lag_range_matches_reference() {
    let mut rng = StdRng::seed_from_u64(19);
    for (tau_min, tau_max, step) in [(-1_000_000, 1_000_000, 1), (i32::MIN, i32::MAX, 1), (-999_999, 50, 4)] {
        let metadata = WindowMetadata::builder(random_set(&mut rng, 0, 30, 50), random_set(&mut rng, 100, 30, 50))
            .window_size(10)
            .lags(tau_min, tau_max)
            .tau_step(step)
            .base_window_offset(5)
            .build()
            .unwrap();
        assert_eq!(metadata.cache_size(), 41);

        let expected = compute_matrix(&metadata).unwrap();
        assert_eq!(expected.len(), 9);
        let actual = MatrixComputation::new(metadata, ComputeConfig::default())
            .run(&())
            .unwrap();
        assert_matrices_close(&actual, &expected, 1e-14);
        assert_eq!(actual.min_lag(), expected.min_lag());
        assert_eq!(actual.max_lag(), expected.max_lag());
    }
}

/// Test scenario: base windows further apart than the lag span
///
/// Consecutive lag ranges do not overlap, so every column starts from a
/// fresh lag window cache.
#[test]
fn test_sparse_base_windows_match_reference() {
    let mut rng = StdRng::seed_from_u64(23);
    for (tau_min, tau_max, step, offset) in [(0, 1, 1, 10), (-2, 2, 3, 13), (-7, -3, 2, 20)] {
        let metadata = WindowMetadata::builder(random_set(&mut rng, 0, 6, 120), random_set(&mut rng, 100, 5, 120))
            .window_size(15)
            .lags(tau_min, tau_max)
            .tau_step(step)
            .base_window_offset(offset)
            .build()
            .unwrap();
        assert!(offset > metadata.cache_size());

        let expected = compute_matrix(&metadata).unwrap();
        for config in [ComputeConfig::default(), ComputeConfig::sequential()] {
            let actual = MatrixComputation::new(metadata.clone(), config).run(&()).unwrap();
            assert!(!actual.is_empty());
            assert_matrices_close(&actual, &expected, 1e-14);
        }
    }
}

/// Test scenario: configuration changes how, never what
#[test]
fn test_configurations_agree() {
    let mut rng = StdRng::seed_from_u64(7);
    let metadata = WindowMetadata::builder(random_set(&mut rng, 0, 7, 60), random_set(&mut rng, 100, 5, 60))
        .window_size(12)
        .lags(-4, 6)
        .tau_step(2)
        .base_window_offset(3)
        .build()
        .unwrap();

    let baseline = MatrixComputation::new(metadata.clone(), ComputeConfig::sequential())
        .run(&())
        .unwrap();
    for config in [
        ComputeConfig::default(),
        ComputeConfig::low_memory(),
        ComputeConfig {
            max_threads: Some(3),
            ..ComputeConfig::default()
        },
    ] {
        let other = MatrixComputation::new(metadata.clone(), config).run(&()).unwrap();
        assert_matrices_close(&other, &baseline, 1e-14);
    }
}

/// Test scenario: single pair through the FFT path
#[test]
fn test_single_pair_matches_reference() {
    let mut rng = StdRng::seed_from_u64(11);
    let metadata = WindowMetadata::builder(random_set(&mut rng, 0, 1, 150), random_set(&mut rng, 1, 1, 150))
        .window_size(30)
        .lags(-20, 20)
        .base_window_offset(10)
        .build()
        .unwrap();

    let store = CorrelogramStore::new();
    let fft = store.get_result(&metadata).unwrap();
    let expected = compute_matrix(&metadata).unwrap();
    assert_matrices_close(&fft, &expected, 1e-9);

    for column in fft.columns() {
        for k in 0..column.len() {
            assert_eq!(column.std_dev[k], 0.0);
            let sig = column.abs_significant[k];
            assert!(sig == 0.0 || sig == 1.0);
        }
    }
}

/// Test scenario: NaN samples under both NaN actions
#[test]
fn test_nan_samples() {
    let mut rng = StdRng::seed_from_u64(3);
    let set_a = random_set(&mut rng, 0, 4, 50);
    let mut gappy: Vec<f64> = random_set(&mut rng, 10, 1, 50)[0].y().to_vec();
    gappy[17] = f64::NAN;
    let set_b = vec![
        Arc::new(NumericSeries::from_values(10, gappy).unwrap()),
        random_set(&mut rng, 11, 1, 50).remove(0),
    ];

    for action in [NaAction::LeaveUnchanged, NaAction::ReplaceWithZero] {
        let metadata = WindowMetadata::builder(set_a.clone(), set_b.clone())
            .window_size(8)
            .lags(-3, 3)
            .base_window_offset(4)
            .na_action(action)
            .build()
            .unwrap();
        let expected = compute_matrix(&metadata).unwrap();
        let actual = MatrixComputation::new(metadata, ComputeConfig::default())
            .run(&())
            .unwrap();
        assert_matrices_close(&actual, &expected, 1e-14);

        // Every cell still has at least the clean B series behind it.
        for column in actual.columns() {
            assert!(column.mean.iter().all(|m| !m.is_nan()));
        }
    }
}

/// Test scenario: statistics have the expected shape on perfectly related data
#[test]
fn test_identical_sets_peak_at_zero_lag() {
    let mut rng = StdRng::seed_from_u64(5);
    let set = random_set(&mut rng, 0, 3, 80);
    let metadata = WindowMetadata::builder(set.clone(), set)
        .window_size(16)
        .lags(-4, 4)
        .base_window_offset(8)
        .build()
        .unwrap();
    let store = CorrelogramStore::new();
    let matrix = store.get_result(&metadata).unwrap();

    for (i, column) in matrix.columns().iter().enumerate() {
        if let Some(k) = column.index_of_lag(0) {
            // The three diagonal pairs correlate perfectly.
            assert!(column.pos_significant[k] >= 3.0 / 9.0);
            let raw = store.raw_distribution(&metadata, i, 0).unwrap();
            assert_eq!(raw.len(), 9);
            for d in 0..3 {
                assert_approx_eq!(raw[d * 3 + d], 1.0, 1e-12);
            }
        }
    }
    assert!(matrix.max(Statistic::Mean) <= 1.0 + 1e-12);
    assert!(matrix.min(Statistic::Mean) >= -1.0 - 1e-12);
}
