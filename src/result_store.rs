//! Memoizing store of computed correlograms.
//!
//! A [`CorrelogramStore`] belongs to one dataset and maps each
//! [`WindowMetadata`] to the matrix computed for it. Keys compare
//! structurally, so repeating a request with the same series identities and
//! parameters is served from memory. Entries live until they are removed or
//! the store is cleared.

use crate::config::ComputeConfig;
use crate::errors::CorrelogramResult;
use crate::matrix::CorrelationMatrix;
use crate::metadata::WindowMetadata;
use crate::orchestrator::MatrixComputation;
use crate::progress::ProgressListener;
use crate::reference;
use crate::single_pair::compute_single_pair;
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Store statistics for monitoring
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StoreStats {
    /// Requests answered from memory
    pub hits: usize,
    /// Requests that were not in memory
    pub misses: usize,
    /// Matrices computed, memoized or not
    pub computations: usize,
}

impl StoreStats {
    /// Fraction of requests answered from memory
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct StoreEntry {
    matrix: Arc<CorrelationMatrix>,
    access_count: usize,
}

/// Request-keyed cache of correlation matrices.
#[derive(Debug, Default)]
pub struct CorrelogramStore {
    entries: RwLock<HashMap<WindowMetadata, StoreEntry>>,
    stats: Mutex<StoreStats>,
    config: ComputeConfig,
}

impl CorrelogramStore {
    /// Empty store with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store computing with `config`.
    pub fn with_config(config: ComputeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Configuration used for computations.
    pub fn config(&self) -> &ComputeConfig {
        &self.config
    }

    /// Matrix for `metadata`, computed on the first request.
    pub fn get_result(&self, metadata: &WindowMetadata) -> CorrelogramResult<Arc<CorrelationMatrix>> {
        self.get_result_with_progress(metadata, &())
    }

    /// Like [`get_result`](Self::get_result), reporting progress of a
    /// computation triggered by a miss.
    pub fn get_result_with_progress(
        &self,
        metadata: &WindowMetadata,
        listener: &dyn ProgressListener,
    ) -> CorrelogramResult<Arc<CorrelationMatrix>> {
        {
            let entries = self.entries.upgradable_read();
            if entries.contains_key(metadata) {
                self.stats.lock().hits += 1;
                let mut entries = RwLockUpgradableReadGuard::upgrade(entries);
                if let Some(entry) = entries.get_mut(metadata) {
                    entry.access_count = entry.access_count.saturating_add(1);
                    return Ok(Arc::clone(&entry.matrix));
                }
            }
        }

        self.stats.lock().misses += 1;
        log::info!(
            "correlogram store miss: computing {}x{} request, window {}, lags {}..={}",
            metadata.set_a().len(),
            metadata.set_b().len(),
            metadata.window_size(),
            metadata.tau_min(),
            metadata.tau_max()
        );
        let matrix = Arc::new(self.compute(metadata, listener)?);

        let mut entries = self.entries.write();
        let entry = entries.entry(metadata.clone()).or_insert_with(|| StoreEntry {
            matrix,
            access_count: 0,
        });
        Ok(Arc::clone(&entry.matrix))
    }

    /// Compute the matrix for `metadata` without consulting or filling the
    /// store.
    pub fn compute(
        &self,
        metadata: &WindowMetadata,
        listener: &dyn ProgressListener,
    ) -> CorrelogramResult<CorrelationMatrix> {
        self.stats.lock().computations += 1;
        if self.config.single_pair_fft && metadata.is_single_pair() {
            let matrix = compute_single_pair(metadata)?;
            listener.on_progress(matrix.len(), matrix.len(), "single pair complete");
            return Ok(matrix);
        }
        MatrixComputation::new(metadata.clone(), self.config.clone()).run(listener)
    }

    /// Raw correlations behind one cell, recomputed directly.
    ///
    /// Returns one value per `(a, b)` pair, `a`-major. Useful for drilling
    /// into the distribution a column statistic summarizes.
    pub fn raw_distribution(
        &self,
        metadata: &WindowMetadata,
        column: usize,
        tau: i32,
    ) -> CorrelogramResult<Vec<f64>> {
        reference::raw_distribution(metadata, column, tau)
    }

    /// Number of memoized matrices.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if nothing is memoized.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// True if a matrix for `metadata` is memoized.
    pub fn contains(&self, metadata: &WindowMetadata) -> bool {
        self.entries.read().contains_key(metadata)
    }

    /// Forget the matrix for `metadata`, returning it if present.
    pub fn remove(&self, metadata: &WindowMetadata) -> Option<Arc<CorrelationMatrix>> {
        self.entries.write().remove(metadata).map(|e| e.matrix)
    }

    /// Number of times the matrix for `metadata` was served from memory.
    pub fn access_count(&self, metadata: &WindowMetadata) -> Option<usize> {
        self.entries.read().get(metadata).map(|e| e.access_count)
    }

    /// Forget every memoized matrix. Statistics are kept.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        log::debug!("correlogram store cleared, {} matrices dropped", count);
    }

    /// Snapshot of the store statistics.
    pub fn stats(&self) -> StoreStats {
        self.stats.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::NumericSeries;

    fn request(a_ids: &[u64], window_size: usize) -> WindowMetadata {
        let series = |id: u64| {
            let y = (0..30).map(|i| ((i as u64 * (id + 3)) % 7) as f64).collect();
            Arc::new(NumericSeries::from_values(id, y).unwrap())
        };
        WindowMetadata::builder(a_ids.iter().map(|&id| series(id)).collect(), vec![series(9)])
            .window_size(window_size)
            .lags(-2, 2)
            .base_window_offset(5)
            .build()
            .unwrap()
    }

    #[test]
    fn test_memoizes_by_structure() {
        let store = CorrelogramStore::new();
        let first = store.get_result(&request(&[1, 2], 6)).unwrap();
        let again = store.get_result(&request(&[1, 2], 6)).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(store.len(), 1);
        assert_eq!(store.access_count(&request(&[1, 2], 6)), Some(1));

        let other = store.get_result(&request(&[1, 2], 7)).unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(store.len(), 2);

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.computations, 2);
        assert!((stats.hit_rate() - 1.0 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn test_clear_and_remove() {
        let store = CorrelogramStore::new();
        let md = request(&[1], 5);
        let first = store.get_result(&md).unwrap();
        assert!(store.contains(&md));
        assert!(store.remove(&md).is_some());
        assert!(!store.contains(&md));

        store.get_result(&md).unwrap();
        store.clear();
        assert!(store.is_empty());
        let recomputed = store.get_result(&md).unwrap();
        assert!(!Arc::ptr_eq(&first, &recomputed));
        assert_eq!(*first, *recomputed);
    }

    #[test]
    fn test_direct_compute_bypasses_store() {
        let store = CorrelogramStore::new();
        let md = request(&[1, 2, 3], 6);
        store.compute(&md, &()).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.stats().computations, 1);
    }
}
