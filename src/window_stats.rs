//! Window statistics primitives.
//!
//! All ranges are inclusive index ranges `[from, to]` into a value slice. The
//! hot-path helpers write into caller-supplied buffers and never allocate.

/// Arithmetic mean of `series[from..=to]`.
#[inline]
pub fn mean(series: &[f64], from: usize, to: usize) -> f64 {
    debug_assert!(from <= to && to < series.len());
    let width = (to - from + 1) as f64;
    series[from..=to].iter().sum::<f64>() / width
}

/// Mean of `series[from..=to]` derived from the mean of an equally wide window
/// that started at `previous_from`.
///
/// Only the samples that left and entered the window are touched. The update
/// falls back to [`mean`] when `previous_mean` is NaN or when the two windows
/// share fewer than half of their samples.
pub fn incremental_mean(
    series: &[f64],
    from: usize,
    to: usize,
    previous_mean: f64,
    previous_from: usize,
) -> f64 {
    let width = to - from + 1;
    if previous_mean.is_nan() {
        return mean(series, from, to);
    }

    let shift = from as i64 - previous_from as i64;
    let overlap = width as i64 - shift.abs();
    if (overlap as f64) < width as f64 / 2.0 {
        return mean(series, from, to);
    }

    let previous_to = previous_from + width - 1;
    let mut sum = previous_mean * width as f64;
    if shift > 0 {
        sum -= series[previous_from..from].iter().sum::<f64>();
        sum += series[previous_to + 1..=to].iter().sum::<f64>();
    } else if shift < 0 {
        sum -= series[to + 1..=previous_to].iter().sum::<f64>();
        sum += series[from..previous_from].iter().sum::<f64>();
    }
    sum / width as f64
}

/// Write `series[from..=to] - mean` into `out`.
///
/// # Panics
/// If `out` is not exactly as long as the window.
#[inline]
pub fn normalize_values(series: &[f64], from: usize, to: usize, mean: f64, out: &mut [f64]) {
    assert_eq!(
        out.len(),
        to - from + 1,
        "output buffer must match the window width"
    );
    for (dst, &v) in out.iter_mut().zip(&series[from..=to]) {
        *dst = v - mean;
    }
}

/// Sum of squares of already-normalized values.
#[inline]
pub fn summed_squares(normalized: &[f64]) -> f64 {
    normalized.iter().map(|v| v * v).sum()
}

/// L2 norm of already-normalized values.
#[inline]
pub fn root_of_summed_squares(normalized: &[f64]) -> f64 {
    summed_squares(normalized).sqrt()
}

/// Pearson correlation from two normalized windows and their norms.
///
/// Returns NaN when either norm is zero.
#[inline]
pub fn correlation_from_normalized(a: &[f64], a_root: f64, b: &[f64], b_root: f64) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let denominator = a_root * b_root;
    if denominator == 0.0 {
        return f64::NAN;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / denominator
}

/// Naive Pearson correlation between `a[from..=to]` and `b[from+tau..=to+tau]`.
///
/// Returns NaN if either window has zero variance.
///
/// # Panics
/// If the shifted window leaves `b`.
pub fn correlation_coefficient(a: &[f64], b: &[f64], from: usize, to: usize, tau: i32) -> f64 {
    let b_from = from as i64 + tau as i64;
    let b_to = to as i64 + tau as i64;
    assert!(
        b_from >= 0 && (b_to as usize) < b.len(),
        "lag window [{}, {}] out of bounds",
        b_from,
        b_to
    );
    let (b_from, b_to) = (b_from as usize, b_to as usize);

    let mean_a = mean(a, from, to);
    let mean_b = mean(b, b_from, b_to);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a[from..=to].iter().zip(&b[b_from..=b_to]) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denominator = (var_a * var_b).sqrt();
    if denominator == 0.0 {
        return f64::NAN;
    }
    cov / denominator
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_mean_inclusive_range() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_approx_eq!(mean(&s, 0, 4), 3.0, 1e-15);
        assert_approx_eq!(mean(&s, 1, 2), 2.5, 1e-15);
        assert_approx_eq!(mean(&s, 4, 4), 5.0, 1e-15);
    }

    #[test]
    fn test_incremental_mean_matches_direct_mean() {
        let mut rng = StdRng::seed_from_u64(42);
        let series: Vec<f64> = (0..200).map(|_| rng.gen_range(-10.0..10.0)).collect();
        let w = 12;
        for stride in 1..=w {
            let mut previous_mean = mean(&series, 0, w - 1);
            let mut previous_from = 0;
            let mut from = stride;
            while from + w <= series.len() {
                let m = incremental_mean(&series, from, from + w - 1, previous_mean, previous_from);
                let direct = mean(&series, from, from + w - 1);
                assert_approx_eq!(m, direct, 1e-13);
                previous_mean = direct;
                previous_from = from;
                from += stride;
            }
        }
    }

    #[test]
    fn test_incremental_mean_moving_backwards() {
        let s: Vec<f64> = (0..20).map(|i| (i * i) as f64).collect();
        let previous = mean(&s, 6, 13);
        let m = incremental_mean(&s, 4, 11, previous, 6);
        assert_approx_eq!(m, mean(&s, 4, 11), 1e-12);
    }

    #[test]
    fn test_incremental_mean_recovers_from_nan() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_approx_eq!(incremental_mean(&s, 2, 5, f64::NAN, 1), 4.5, 1e-15);
    }

    #[test]
    fn test_incremental_mean_far_jump_recomputes() {
        // Overlap of 1 out of 4 is below half the window; a wrong previous
        // mean must not leak into the result.
        let s = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert_approx_eq!(incremental_mean(&s, 3, 6, 1000.0, 0), 5.5, 1e-15);
        // Overlap of exactly half reuses the previous mean.
        let reused = incremental_mean(&s, 2, 5, 1000.0, 0);
        assert!(reused > 100.0);
    }

    #[test]
    fn test_normalize_and_norm() {
        let s = [2.0, 4.0, 6.0];
        let mut out = [0.0; 3];
        normalize_values(&s, 0, 2, 4.0, &mut out);
        assert_eq!(out, [-2.0, 0.0, 2.0]);
        assert_approx_eq!(summed_squares(&out), 8.0, 1e-15);
        assert_approx_eq!(root_of_summed_squares(&out), 8f64.sqrt(), 1e-15);
    }

    #[test]
    #[should_panic(expected = "window width")]
    fn test_normalize_rejects_wrong_buffer() {
        let mut out = [0.0; 2];
        normalize_values(&[1.0, 2.0, 3.0], 0, 2, 0.0, &mut out);
    }

    #[test]
    fn test_correlation_coefficient() {
        let a = [1.0, 2.0, 3.0, 4.0, 4.0, 3.0, 2.0, 1.0];
        let b = [4.0, 3.0, 2.0, 1.0, 1.0, 2.0, 3.0, 4.0];
        assert_approx_eq!(correlation_coefficient(&a, &b, 0, 3, 0), -1.0, 1e-14);
        assert_approx_eq!(correlation_coefficient(&a, &b, 0, 3, 4), 1.0, 1e-14);
        assert_approx_eq!(correlation_coefficient(&a, &a, 2, 5, 0), 1.0, 1e-14);
    }

    #[test]
    fn test_zero_variance_is_nan() {
        let a = [1.0, 1.0, 1.0, 1.0];
        let b = [1.0, 2.0, 3.0, 4.0];
        assert!(correlation_coefficient(&a, &b, 0, 3, 0).is_nan());
        assert!(correlation_from_normalized(&[0.0; 2], 0.0, &[1.0, -1.0], 2f64.sqrt()).is_nan());
    }
}
