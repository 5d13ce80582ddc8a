//! # Computation Configuration
//!
//! Knobs that change how a correlogram is computed, never what it contains.
//! Every preset produces the same matrix for the same request.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for matrix computations
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComputeConfig {
    /// Upper bound on worker threads; `None` uses the available parallelism
    pub max_threads: Option<usize>,
    /// Keep the normalized values of every base window in memory instead of
    /// renormalizing on each access
    pub keep_base_window_values: bool,
    /// Route 1-against-1 requests through the FFT single-pair path
    pub single_pair_fft: bool,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            max_threads: None,
            keep_base_window_values: true,
            single_pair_fft: true,
        }
    }
}

impl ComputeConfig {
    /// Single worker thread
    pub fn sequential() -> Self {
        Self {
            max_threads: Some(1),
            ..Self::default()
        }
    }

    /// Recompute base window values on demand
    pub fn low_memory() -> Self {
        Self {
            keep_base_window_values: false,
            ..Self::default()
        }
    }

    /// Worker count for a request with the given set sizes.
    ///
    /// `min(max(|A|, |B|), available_parallelism)`, further capped by
    /// `max_threads`, never below one.
    pub fn worker_count(&self, set_a_len: usize, set_b_len: usize) -> usize {
        let available = std::thread::available_parallelism().map_or(1, |n| n.get());
        let mut threads = set_a_len.max(set_b_len).min(available);
        if let Some(cap) = self.max_threads {
            threads = threads.min(cap);
        }
        threads.max(1)
    }
}
