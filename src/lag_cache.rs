//! Ring-buffer cache of lag-window statistics.
//!
//! Each set-B series owns one column holding a contiguous run of at most
//! `capacity` windows, identified by their start index. Consecutive base
//! windows share most of their lag windows, so the run only ever advances:
//! appends must land exactly one past the current end, and once the ring is
//! full every append evicts the oldest window.
//!
//! Columns sit behind their own `RwLock`. During the precompute phase every
//! column is written by exactly one worker; during the compute phase all
//! workers only read, so the locks are never contended.

use crate::window_stats::{incremental_mean, normalize_values, root_of_summed_squares};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;

/// Cached windows of one series.
#[derive(Debug)]
pub struct LagWindowColumn {
    series: Arc<[f64]>,
    window_size: usize,
    capacity: usize,
    range_start: usize,
    count: usize,
    /// Ring slot holding `range_start`.
    head: usize,
    values: Vec<f64>,
    roots: Vec<f64>,
    /// Mean of the most recently computed window, chained into the next one.
    front_mean: f64,
    last_from: usize,
}

impl LagWindowColumn {
    fn new(series: Arc<[f64]>, window_size: usize, capacity: usize) -> Self {
        Self {
            series,
            window_size,
            capacity,
            range_start: 0,
            count: 0,
            head: 0,
            values: vec![0.0; capacity * window_size],
            roots: vec![0.0; capacity],
            front_mean: f64::NAN,
            last_from: 0,
        }
    }

    /// First cached start index. Meaningless while the column is empty.
    pub fn range_start(&self) -> usize {
        self.range_start
    }

    /// Number of cached windows.
    pub fn len(&self) -> usize {
        self.count
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True iff `range_start <= start <= range_start + count - 1`.
    pub fn has_window(&self, start: usize) -> bool {
        self.count > 0 && start >= self.range_start && start < self.range_start + self.count
    }

    fn slot(&self, start: usize) -> usize {
        (self.head + (start - self.range_start)) % self.capacity
    }

    /// Cached `(normalized_values, root_of_summed_squares)` for `start`.
    pub fn window(&self, start: usize) -> Option<(&[f64], f64)> {
        if !self.has_window(start) {
            return None;
        }
        let slot = self.slot(start);
        let w = self.window_size;
        Some((&self.values[slot * w..(slot + 1) * w], self.roots[slot]))
    }

    /// Reserve the slot for `start`, evicting the oldest window when full.
    fn append_slot(&mut self, start: usize) -> usize {
        if self.count == 0 {
            self.range_start = start;
            self.head = 0;
        } else {
            let expected = self.range_start + self.count;
            assert!(
                start == expected,
                "non-contiguous lag window append: got start {}, expected {}",
                start,
                expected
            );
        }

        if self.count == self.capacity {
            self.head = (self.head + 1) % self.capacity;
            self.range_start += 1;
        } else {
            self.count += 1;
        }
        self.slot(start)
    }

    /// Append externally computed values for `start`.
    ///
    /// # Panics
    /// If `start` is not exactly one past the current range end, or if
    /// `normalized` does not match the window size.
    pub fn put(&mut self, start: usize, normalized: &[f64], root: f64) {
        assert_eq!(
            normalized.len(),
            self.window_size,
            "normalized values must match the window size"
        );
        let slot = self.append_slot(start);
        let w = self.window_size;
        self.values[slot * w..(slot + 1) * w].copy_from_slice(normalized);
        self.roots[slot] = root;
    }

    /// Compute window `start` from the series and append it.
    fn compute_and_put(&mut self, start: usize) {
        let to = start + self.window_size - 1;
        let mean = incremental_mean(&self.series, start, to, self.front_mean, self.last_from);
        let slot = self.append_slot(start);
        let w = self.window_size;
        let out = &mut self.values[slot * w..(slot + 1) * w];
        normalize_values(&self.series, start, to, mean, out);
        self.roots[slot] = root_of_summed_squares(out);
        self.front_mean = mean;
        self.last_from = start;
    }

    /// Make sure every window in `[lo, hi]` is cached.
    ///
    /// A gap between the cached run and `lo` discards the run. Windows
    /// already cached are kept.
    ///
    /// # Panics
    /// If the range is wider than the capacity or starts before the cached
    /// run.
    pub fn ensure_range(&mut self, lo: usize, hi: usize) {
        if hi < lo {
            return;
        }
        assert!(
            hi - lo + 1 <= self.capacity,
            "lag window range [{}, {}] exceeds cache capacity {}",
            lo,
            hi,
            self.capacity
        );
        if self.count > 0 && lo > self.range_start + self.count {
            self.clear();
        }
        if self.count > 0 {
            assert!(
                lo >= self.range_start,
                "lag window range start {} precedes cached start {}",
                lo,
                self.range_start
            );
        }
        let next = if self.count == 0 {
            lo
        } else {
            (self.range_start + self.count).max(lo)
        };
        for start in next..=hi {
            self.compute_and_put(start);
        }
    }

    /// Cached window, computing it (and every window between the current end
    /// and it) on a miss.
    ///
    /// # Panics
    /// If `start` has already been evicted.
    pub fn get_or_compute(&mut self, start: usize) -> (&[f64], f64) {
        if !self.has_window(start) {
            assert!(
                self.count == 0 || start >= self.range_start,
                "lag window {} was evicted (cached range starts at {})",
                start,
                self.range_start
            );
            let next = self.range_start + self.count;
            if self.count == 0 || start >= next + self.capacity {
                self.clear();
                self.compute_and_put(start);
            } else {
                for s in next..=start {
                    self.compute_and_put(s);
                }
            }
        }
        let slot = self.slot(start);
        let w = self.window_size;
        (&self.values[slot * w..(slot + 1) * w], self.roots[slot])
    }

    /// Drop all cached windows, keeping the chained mean.
    pub fn clear(&mut self) {
        self.count = 0;
        self.head = 0;
    }
}

/// One [`LagWindowColumn`] per set-B series.
#[derive(Debug)]
pub struct LagWindowCache {
    columns: Vec<RwLock<LagWindowColumn>>,
    window_size: usize,
    capacity: usize,
}

impl LagWindowCache {
    /// Create empty columns for `series`, each holding up to `capacity` windows.
    ///
    /// # Panics
    /// If `window_size` or `capacity` is zero.
    pub fn new(series: Vec<Arc<[f64]>>, window_size: usize, capacity: usize) -> Self {
        assert!(window_size > 0, "window size must be positive");
        assert!(capacity > 0, "cache capacity must be positive");
        let columns = series
            .into_iter()
            .map(|s| RwLock::new(LagWindowColumn::new(s, window_size, capacity)))
            .collect();
        Self {
            columns,
            window_size,
            capacity,
        }
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Window width.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Windows per column.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shared access to one column.
    pub fn column(&self, col: usize) -> RwLockReadGuard<'_, LagWindowColumn> {
        self.columns[col].read()
    }

    /// See [`LagWindowColumn::has_window`].
    pub fn has_window(&self, col: usize, start: usize) -> bool {
        self.columns[col].read().has_window(start)
    }

    /// See [`LagWindowColumn::put`].
    pub fn put(&self, col: usize, start: usize, normalized: &[f64], root: f64) {
        self.columns[col].write().put(start, normalized, root);
    }

    /// See [`LagWindowColumn::ensure_range`].
    pub fn ensure_range(&self, col: usize, lo: usize, hi: usize) {
        self.columns[col].write().ensure_range(lo, hi);
    }

    /// Normalized values of window `start`, computed on a miss.
    pub fn normalized_values(&self, col: usize, start: usize) -> Vec<f64> {
        {
            let column = self.columns[col].read();
            if let Some((values, _)) = column.window(start) {
                return values.to_vec();
            }
        }
        self.columns[col].write().get_or_compute(start).0.to_vec()
    }

    /// Norm of window `start`, computed on a miss.
    pub fn root_of_summed_squares(&self, col: usize, start: usize) -> f64 {
        {
            let column = self.columns[col].read();
            if let Some((_, root)) = column.window(start) {
                return root;
            }
        }
        self.columns[col].write().get_or_compute(start).1
    }
}
