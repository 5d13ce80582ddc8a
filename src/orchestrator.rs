//! Parallel computation of a full correlation matrix.
//!
//! Work is split over a fixed group of workers that advance through the base
//! windows in lockstep. For every base window:
//!
//! 1. each worker fills the lag-window cache for its contiguous slice of set
//!    B, then waits at the precompute barrier;
//! 2. each worker correlates its slice of set A against every B series and
//!    every valid lag, writing into its own cell block, then waits at the
//!    compute barrier;
//! 3. the last worker to arrive aggregates the cells into a column, appends
//!    it, reports progress and advances the shared [`IterationState`].
//!
//! Cancellation is checked by the aggregating worker, so the matrix always
//! holds whole columns.

use crate::aggregate::LagStatistics;
use crate::config::ComputeConfig;
use crate::errors::{validate_allocation_size, CorrelogramError, CorrelogramResult};
use crate::lag_cache::LagWindowCache;
use crate::matrix::{Column, CorrelationMatrix};
use crate::metadata::{LagRange, WindowMetadata};
use crate::phased::{PhasedParallel, WorkerContext};
use crate::precompute::BaseWindowStats;
use crate::progress::{CancellationToken, ComputationPhase, ProgressListener};
use crate::series::NumericSeries;
use crate::significance::SignificanceTester;
use crate::window_stats::correlation_from_normalized;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared loop state, only mutated inside barrier completion actions.
#[derive(Debug)]
struct IterationState {
    base_window_start: usize,
    column_index: usize,
    lags: LagRange,
    stop: bool,
    cancelled: bool,
    phase_started: Instant,
    precompute_time: Duration,
    compute_time: Duration,
    aggregate_time: Duration,
}

impl IterationState {
    fn new(metadata: &WindowMetadata) -> Self {
        Self {
            base_window_start: 0,
            column_index: 0,
            lags: metadata.lag_range(0),
            stop: false,
            cancelled: false,
            phase_started: Instant::now(),
            precompute_time: Duration::ZERO,
            compute_time: Duration::ZERO,
            aggregate_time: Duration::ZERO,
        }
    }

    fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now - self.phase_started;
        self.phase_started = now;
        elapsed
    }
}

/// Inputs shared by all workers of one run.
struct RunContext<'a> {
    metadata: &'a WindowMetadata,
    a_values: Vec<Arc<[f64]>>,
    cache: LagWindowCache,
    tester: SignificanceTester,
    keep_base_window_values: bool,
    state: Mutex<IterationState>,
    /// Per-worker cells laid out as `[lag][local_a * |B| + b]`.
    blocks: Vec<Mutex<Vec<f64>>>,
    listener: &'a dyn ProgressListener,
}

/// One correlogram computation with observable progress.
///
/// The handle can be shared with other threads, which may watch
/// [`phase`](Self::phase) and [`progress`](Self::progress), cancel through
/// [`cancel_token`](Self::cancel_token), or take a
/// [`matrix_snapshot`](Self::matrix_snapshot) of the columns finished so far.
#[derive(Debug)]
pub struct MatrixComputation {
    metadata: WindowMetadata,
    config: ComputeConfig,
    phase: Mutex<ComputationPhase>,
    completed: AtomicUsize,
    cancel: CancellationToken,
    matrix: Mutex<CorrelationMatrix>,
}

impl MatrixComputation {
    /// Prepare a computation; nothing runs until [`run`](Self::run).
    pub fn new(metadata: WindowMetadata, config: ComputeConfig) -> Self {
        let matrix = CorrelationMatrix::new(&metadata);
        Self {
            metadata,
            config,
            phase: Mutex::new(ComputationPhase::Idle),
            completed: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
            matrix: Mutex::new(matrix),
        }
    }

    /// Request being computed.
    pub fn metadata(&self) -> &WindowMetadata {
        &self.metadata
    }

    /// Current phase.
    pub fn phase(&self) -> ComputationPhase {
        *self.phase.lock()
    }

    /// `(completed, total)` base windows.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.completed.load(Ordering::Acquire),
            self.metadata.base_window_count(),
        )
    }

    /// Token that cancels this computation at the next base window boundary.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Copy of the columns aggregated so far.
    pub fn matrix_snapshot(&self) -> CorrelationMatrix {
        self.matrix.lock().clone()
    }

    fn set_phase(&self, phase: ComputationPhase) {
        *self.phase.lock() = phase;
    }

    /// Compute the matrix.
    ///
    /// Every call starts from an empty matrix. On cancellation or worker
    /// failure the columns finished so far stay available through
    /// [`matrix_snapshot`](Self::matrix_snapshot).
    pub fn run(&self, listener: &dyn ProgressListener) -> CorrelogramResult<CorrelationMatrix> {
        let metadata = &self.metadata;
        *self.matrix.lock() = CorrelationMatrix::new(metadata);
        self.completed.store(0, Ordering::Release);

        let total = metadata.base_window_count();
        if total == 0 {
            log::debug!(
                "no base window of size {} fits into series of length {}",
                metadata.window_size(),
                metadata.series_length()
            );
            self.set_phase(ComputationPhase::Done);
            return Ok(self.matrix_snapshot());
        }
        if self.cancel.is_cancelled() {
            self.set_phase(ComputationPhase::Cancelled);
            return Err(CorrelogramError::Cancelled {
                completed_columns: 0,
            });
        }

        let set_a = metadata.set_a();
        let set_b = metadata.set_b();
        let cells_per_lag = set_a.len() * set_b.len();
        validate_allocation_size(
            cells_per_lag
                .saturating_mul(metadata.max_valid_lag_count())
                .saturating_mul(std::mem::size_of::<f64>()),
            "correlation cell buffer",
        )?;
        validate_allocation_size(
            set_b
                .len()
                .saturating_mul(metadata.cache_size())
                .saturating_mul(metadata.window_size() + 1)
                .saturating_mul(std::mem::size_of::<f64>()),
            "lag window cache",
        )?;

        let na_action = metadata.na_action();
        let prepare = |set: &[Arc<NumericSeries>]| -> Vec<Arc<[f64]>> {
            set.iter().map(|s| Arc::from(na_action.apply(s.y()))).collect()
        };
        let threads = self.config.worker_count(set_a.len(), set_b.len());
        let ctx = RunContext {
            metadata,
            a_values: prepare(set_a),
            cache: LagWindowCache::new(prepare(set_b), metadata.window_size(), metadata.cache_size()),
            tester: SignificanceTester::new(metadata.window_size(), metadata.significance_level())?,
            keep_base_window_values: self.config.keep_base_window_values,
            state: Mutex::new(IterationState::new(metadata)),
            blocks: (0..threads).map(|_| Mutex::new(Vec::new())).collect(),
            listener,
        };

        log::debug!(
            "computing {}x{} correlogram: {} base windows, up to {} lags, {} workers",
            set_a.len(),
            set_b.len(),
            total,
            metadata.max_valid_lag_count(),
            threads
        );
        self.set_phase(ComputationPhase::Precomputing);
        let outcome = PhasedParallel::new(threads).run(|worker| self.worker(&ctx, worker));

        let state = ctx.state.lock();
        log::debug!(
            "correlogram finished after {} columns: precompute {:?}, compute {:?}, aggregate {:?}",
            state.column_index,
            state.precompute_time,
            state.compute_time,
            state.aggregate_time
        );

        match outcome {
            Err(err) => {
                self.set_phase(ComputationPhase::Failed);
                log::warn!("correlogram computation failed: {}", err);
                Err(err)
            }
            Ok(()) if state.cancelled => {
                self.set_phase(ComputationPhase::Cancelled);
                Err(CorrelogramError::Cancelled {
                    completed_columns: state.column_index,
                })
            }
            Ok(()) => {
                self.set_phase(ComputationPhase::Done);
                Ok(self.matrix_snapshot())
            }
        }
    }

    fn worker(&self, ctx: &RunContext<'_>, worker: WorkerContext<'_>) -> CorrelogramResult<()> {
        let metadata = ctx.metadata;
        let w = metadata.window_size();
        let b_count = metadata.set_b().len();
        let a_range = worker.partition(ctx.a_values.len());
        let b_range = worker.partition(b_count);

        let base_stats: Vec<BaseWindowStats> = ctx.a_values[a_range.clone()]
            .iter()
            .map(|series| {
                BaseWindowStats::new(
                    series,
                    w,
                    metadata.base_window_offset(),
                    ctx.keep_base_window_values,
                )
            })
            .collect();
        let mut base_values = vec![0.0; w];

        loop {
            let (start, lags) = {
                let state = ctx.state.lock();
                if state.stop {
                    return Ok(());
                }
                (state.base_window_start, state.lags)
            };

            if !lags.is_empty() {
                let lo = (start as i64 + metadata.tau_min() as i64).max(0) as usize;
                let hi = (start as i64 + lags.last_tau() as i64) as usize;
                for b in b_range.clone() {
                    ctx.cache.ensure_range(b, lo, hi);
                }
            }

            worker.wait_then(|| {
                let mut state = ctx.state.lock();
                let elapsed = state.lap();
                state.precompute_time += elapsed;
                self.set_phase(ComputationPhase::Computing);
                Ok(())
            })?;

            {
                let mut block = ctx.blocks[worker.index()].lock();
                let stride = a_range.len() * b_count;
                block.clear();
                block.resize(lags.count * stride, f64::NAN);

                for (local_a, a) in a_range.clone().enumerate() {
                    let stats = &base_stats[local_a];
                    let k = stats.window_number_for_start_index(start);
                    let a_root = stats.root_of_summed_squares(k);
                    let a_values: &[f64] = match stats.normalized_values(k) {
                        Some(stored) => stored,
                        None => {
                            stats.normalized_values_into(&ctx.a_values[a], k, &mut base_values);
                            &base_values
                        }
                    };

                    for b in 0..b_count {
                        let column = ctx.cache.column(b);
                        for li in 0..lags.count {
                            let lag_start = (start as i64 + lags.tau(li) as i64) as usize;
                            let (b_values, b_root) = column.window(lag_start).ok_or_else(|| {
                                CorrelogramError::WorkerFailed {
                                    reason: format!(
                                        "lag window {} of series {} missing from cache",
                                        lag_start, b
                                    ),
                                }
                            })?;
                            block[li * stride + local_a * b_count + b] =
                                correlation_from_normalized(a_values, a_root, b_values, b_root);
                        }
                    }
                }
            }

            worker.wait_then(|| self.aggregate_column(ctx))?;
        }
    }

    /// Completion action of the compute barrier.
    fn aggregate_column(&self, ctx: &RunContext<'_>) -> CorrelogramResult<()> {
        let metadata = ctx.metadata;
        let mut state = ctx.state.lock();
        let elapsed = state.lap();
        state.compute_time += elapsed;
        self.set_phase(ComputationPhase::Aggregating);

        let start = state.base_window_start;
        let lags = state.lags;
        let x = metadata.set_a()[0].x();
        let mut column = Column::new(start, x[start], x[start + metadata.window_size() - 1], lags);

        let blocks: Vec<_> = ctx.blocks.iter().map(|b| b.lock()).collect();
        let mut scratch = Vec::new();
        for li in 0..lags.count {
            let cells = blocks.iter().flat_map(|block| {
                let per_lag = block.len() / lags.count;
                block[li * per_lag..(li + 1) * per_lag].iter().copied()
            });
            column.push(LagStatistics::from_values(cells, &ctx.tester, &mut scratch));
        }
        drop(blocks);

        self.matrix.lock().push_column(column);
        state.column_index += 1;
        let completed = state.column_index;
        self.completed.store(completed, Ordering::Release);

        let total = metadata.base_window_count();
        ctx.listener.on_progress(
            completed,
            total,
            &format!("base window {} of {}", completed, total),
        );

        let next = start + metadata.base_window_offset();
        if completed == total {
            state.stop = true;
        } else if self.cancel.is_cancelled() {
            log::info!("correlogram cancelled after {} of {} columns", completed, total);
            state.stop = true;
            state.cancelled = true;
        } else {
            state.base_window_start = next;
            state.lags = metadata.lag_range(next);
            self.set_phase(ComputationPhase::Precomputing);
        }
        let elapsed = state.lap();
        state.aggregate_time += elapsed;
        Ok(())
    }
}
