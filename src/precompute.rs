//! Per-series statistics of every base window.
//!
//! Base windows sit at `start = k * stride` for `k = 0, 1, ...` while the
//! window fits. Means are chained with [`incremental_mean`], so neighbouring
//! windows only pay for the samples that changed. Keeping the normalized
//! values of every window costs `O(window_size * window_count)` memory and
//! saves renormalizing on each access.

use crate::window_stats::{incremental_mean, normalize_values, summed_squares};

/// Statistics of all base windows of one series.
#[derive(Debug, Clone)]
pub struct BaseWindowStats {
    window_size: usize,
    stride: usize,
    means: Vec<f64>,
    summed_squares: Vec<f64>,
    /// Row-major `window_count x window_size`, present if requested.
    normalized: Option<Vec<f64>>,
}

impl BaseWindowStats {
    /// Precompute every base window of `series`.
    ///
    /// # Panics
    /// If `window_size` or `stride` is zero.
    pub fn new(series: &[f64], window_size: usize, stride: usize, keep_normalized: bool) -> Self {
        assert!(window_size > 0, "window size must be positive");
        assert!(stride > 0, "stride must be positive");

        let count = if window_size > series.len() {
            0
        } else {
            (series.len() - window_size) / stride + 1
        };

        let mut means = Vec::with_capacity(count);
        let mut squares = Vec::with_capacity(count);
        let mut normalized = keep_normalized.then(|| vec![0.0; count * window_size]);
        let mut scratch = vec![0.0; window_size];

        let mut previous_mean = f64::NAN;
        let mut previous_from = 0;
        for k in 0..count {
            let from = k * stride;
            let to = from + window_size - 1;
            let mean = incremental_mean(series, from, to, previous_mean, previous_from);

            let out = match normalized.as_mut() {
                Some(all) => &mut all[k * window_size..(k + 1) * window_size],
                None => &mut scratch[..],
            };
            normalize_values(series, from, to, mean, out);
            squares.push(summed_squares(out));
            means.push(mean);

            previous_mean = mean;
            previous_from = from;
        }

        Self {
            window_size,
            stride,
            means,
            summed_squares: squares,
            normalized,
        }
    }

    /// Number of base windows.
    pub fn window_count(&self) -> usize {
        self.means.len()
    }

    /// Window width.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Distance between window starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Window number for a start index.
    ///
    /// # Panics
    /// If `start` is not a multiple of the stride or beyond the last window.
    pub fn window_number_for_start_index(&self, start: usize) -> usize {
        assert!(
            start % self.stride == 0,
            "start index {} is not a multiple of stride {}",
            start,
            self.stride
        );
        let k = start / self.stride;
        assert!(
            k < self.window_count(),
            "start index {} is past the last base window",
            start
        );
        k
    }

    /// Mean of window `k`.
    pub fn mean(&self, k: usize) -> f64 {
        self.means[k]
    }

    /// Sum of squared deviations of window `k`.
    pub fn summed_squares(&self, k: usize) -> f64 {
        self.summed_squares[k]
    }

    /// L2 norm of the normalized values of window `k`.
    pub fn root_of_summed_squares(&self, k: usize) -> f64 {
        self.summed_squares[k].sqrt()
    }

    /// Stored normalized values of window `k`, if they were kept.
    pub fn normalized_values(&self, k: usize) -> Option<&[f64]> {
        self.normalized
            .as_deref()
            .map(|all| &all[k * self.window_size..(k + 1) * self.window_size])
    }

    /// Normalized values of window `k`, copied from storage or recomputed
    /// from `series` into `out`.
    pub fn normalized_values_into(&self, series: &[f64], k: usize, out: &mut [f64]) {
        match self.normalized_values(k) {
            Some(stored) => out.copy_from_slice(stored),
            None => {
                let from = k * self.stride;
                normalize_values(series, from, from + self.window_size - 1, self.means[k], out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window_stats::mean;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_window_count_and_means() {
        let series: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let stats = BaseWindowStats::new(&series, 4, 3, true);
        // starts 0, 3, 6
        assert_eq!(stats.window_count(), 3);
        for k in 0..3 {
            let from = k * 3;
            assert_approx_eq!(stats.mean(k), mean(&series, from, from + 3), 1e-13);
            assert_approx_eq!(stats.summed_squares(k), 5.0, 1e-12);
        }
        assert_eq!(stats.normalized_values(1).unwrap(), &[-1.5, -0.5, 0.5, 1.5]);
    }

    #[test]
    fn test_normalized_values_recomputed_when_not_kept() {
        let series = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let kept = BaseWindowStats::new(&series, 3, 2, true);
        let lean = BaseWindowStats::new(&series, 3, 2, false);
        assert!(lean.normalized_values(0).is_none());

        let mut a = [0.0; 3];
        let mut b = [0.0; 3];
        for k in 0..kept.window_count() {
            kept.normalized_values_into(&series, k, &mut a);
            lean.normalized_values_into(&series, k, &mut b);
            assert_eq!(a, b);
            assert_eq!(kept.summed_squares(k), lean.summed_squares(k));
        }
    }

    #[test]
    fn test_window_larger_than_series() {
        let stats = BaseWindowStats::new(&[1.0, 2.0], 3, 1, true);
        assert_eq!(stats.window_count(), 0);
    }

    #[test]
    fn test_window_number_for_start_index() {
        let series = [0.0; 20];
        let stats = BaseWindowStats::new(&series, 5, 5, false);
        assert_eq!(stats.window_number_for_start_index(10), 2);
    }

    #[test]
    #[should_panic(expected = "not a multiple of stride")]
    fn test_window_number_requires_stride_alignment() {
        let series = [0.0; 20];
        BaseWindowStats::new(&series, 5, 5, false).window_number_for_start_index(7);
    }
}
