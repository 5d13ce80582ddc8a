//! # Lagged Correlogram
//!
//! Windowed, lagged cross-correlation matrices between two ensembles of time
//! series.
//!
//! For every base window of set A (width `w`, stepping by a fixed offset)
//! and every lag `tau` in a configured range, the crate computes the Pearson
//! correlation of each A window against the shifted window of each B series
//! and summarizes the resulting `|A| x |B|` values per lag: mean, standard
//! deviation, median, interquartile range and the fractions that are
//! significantly positive, negative or either, under a Student-t test.
//!
//! ## Key Features
//!
//! - **Incremental window statistics**: sliding means are updated from the
//!   samples that enter and leave a window instead of being recomputed
//! - **Lag-window cache**: normalized lag windows are computed once per B
//!   series and reused across overlapping base windows
//! - **Parallel lockstep workers**: base windows are processed in order by a
//!   fixed worker group separated by barriers
//! - **Memoization**: repeated requests are answered from a
//!   [`CorrelogramStore`]
//! - **FFT single-pair path**: one-against-one requests take all lags of a
//!   base window from a single cross-correlation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lagged_correlogram::{CorrelogramStore, NumericSeries, Statistic, WindowMetadata};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let a: Vec<f64> = (0..200).map(|i| (i as f64 * 0.1).sin()).collect();
//!     let b: Vec<f64> = (0..200).map(|i| (i as f64 * 0.1 + 0.5).sin()).collect();
//!
//!     let request = WindowMetadata::builder(
//!         vec![Arc::new(NumericSeries::from_values(1, a)?)],
//!         vec![Arc::new(NumericSeries::from_values(2, b)?)],
//!     )
//!     .window_size(25)
//!     .lags(-10, 10)
//!     .base_window_offset(5)
//!     .build()?;
//!
//!     let store = CorrelogramStore::new();
//!     let matrix = store.get_result(&request)?;
//!     println!(
//!         "{} columns, mean correlation in [{:.3}, {:.3}]",
//!         matrix.len(),
//!         matrix.min(Statistic::Mean),
//!         matrix.max(Statistic::Mean)
//!     );
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod complex_sequence;
pub mod config;
pub mod dft;
pub mod errors;
pub mod lag_cache;
pub mod matrix;
pub mod metadata;
pub mod orchestrator;
pub mod phased;
pub mod precompute;
pub mod progress;
pub mod reference;
pub mod result_store;
pub mod series;
pub mod significance;
pub mod single_pair;
pub mod window_stats;

pub use aggregate::LagStatistics;
pub use complex_sequence::ComplexSequence;
pub use config::ComputeConfig;
pub use dft::{
    brute_force_cross_correlation, clear_twiddle_cache, cross_correlation,
    cross_correlation_windowed, transform, twiddle_cache_stats, Direction,
};
pub use errors::{CorrelogramError, CorrelogramResult};
pub use matrix::{Column, CorrelationMatrix, Statistic};
pub use metadata::{LagRange, NaAction, WindowMetadata, WindowMetadataBuilder};
pub use orchestrator::MatrixComputation;
pub use phased::{PhaseBarrier, PhasedParallel};
pub use progress::{CancellationToken, ComputationPhase, ProgressListener};
pub use result_store::{CorrelogramStore, StoreStats};
pub use series::NumericSeries;
pub use significance::SignificanceTester;
