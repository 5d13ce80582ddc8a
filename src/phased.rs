//! Fixed-size worker groups that advance through phases in lockstep.
//!
//! [`PhasedParallel::run`] starts one scoped thread per worker and hands each
//! a [`WorkerContext`] with its index, a contiguous partition helper and a
//! shared [`PhaseBarrier`]. A barrier wait can carry a completion action that
//! runs exactly once, on the last worker to arrive, before anyone is
//! released.
//!
//! The barrier is breakable: a worker that panics or returns an error breaks
//! it, every current and future wait fails with that error, and `run` hands
//! the original cause back to the caller.

use crate::errors::{CorrelogramError, CorrelogramResult};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    broken: Option<CorrelogramError>,
}

/// Reusable barrier with a leader-run completion action.
#[derive(Debug)]
pub struct PhaseBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl PhaseBarrier {
    /// Barrier for `parties` participants.
    ///
    /// # Panics
    /// If `parties` is zero.
    pub fn new(parties: usize) -> Self {
        assert!(parties > 0, "a barrier needs at least one party");
        Self {
            parties,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                broken: None,
            }),
            released: Condvar::new(),
        }
    }

    /// Number of participants.
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Wait for every party.
    pub fn wait(&self) -> CorrelogramResult<()> {
        self.wait_then(|| Ok(()))
    }

    /// Wait for every party; the last to arrive runs `action` before the
    /// others are released.
    ///
    /// A failing or panicking action breaks the barrier.
    pub fn wait_then<F>(&self, action: F) -> CorrelogramResult<()>
    where
        F: FnOnce() -> CorrelogramResult<()>,
    {
        let mut state = self.state.lock();
        if let Some(err) = &state.broken {
            return Err(err.clone());
        }

        state.arrived += 1;
        if state.arrived == self.parties {
            drop(state);
            let outcome = match catch_unwind(AssertUnwindSafe(action)) {
                Ok(result) => result,
                Err(payload) => Err(CorrelogramError::WorkerFailed {
                    reason: format!("completion action panicked: {}", panic_message(&*payload)),
                }),
            };

            let mut state = self.state.lock();
            if let Err(err) = outcome {
                state.broken.get_or_insert(err);
            }
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            let result = match &state.broken {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            };
            drop(state);
            self.released.notify_all();
            return result;
        }

        let generation = state.generation;
        while state.generation == generation && state.broken.is_none() {
            self.released.wait(&mut state);
        }
        match &state.broken {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Break the barrier with `cause`, waking every waiter. The first cause
    /// wins.
    pub fn break_with(&self, cause: CorrelogramError) {
        let mut state = self.state.lock();
        state.broken.get_or_insert(cause);
        drop(state);
        self.released.notify_all();
    }

    /// Cause the barrier was broken with, if any.
    pub fn broken(&self) -> Option<CorrelogramError> {
        self.state.lock().broken.clone()
    }
}

/// Per-worker view handed to the body of [`PhasedParallel::run`].
#[derive(Debug, Clone, Copy)]
pub struct WorkerContext<'a> {
    index: usize,
    threads: usize,
    barrier: &'a PhaseBarrier,
}

impl<'a> WorkerContext<'a> {
    /// Index of this worker in `0..threads`.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Size of the worker group.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// This worker's share of `0..len`.
    pub fn partition(&self, len: usize) -> Range<usize> {
        partition(len, self.threads, self.index)
    }

    /// See [`PhaseBarrier::wait`].
    pub fn wait(&self) -> CorrelogramResult<()> {
        self.barrier.wait()
    }

    /// See [`PhaseBarrier::wait_then`].
    pub fn wait_then<F>(&self, action: F) -> CorrelogramResult<()>
    where
        F: FnOnce() -> CorrelogramResult<()>,
    {
        self.barrier.wait_then(action)
    }
}

/// Contiguous share `index` of `0..len` split into `parts` near-equal ranges.
///
/// Shares differ in size by at most one and may be empty when
/// `len < parts`.
pub fn partition(len: usize, parts: usize, index: usize) -> Range<usize> {
    debug_assert!(index < parts);
    (index * len) / parts..((index + 1) * len) / parts
}

/// Group of workers that share one [`PhaseBarrier`].
#[derive(Debug, Clone, Copy)]
pub struct PhasedParallel {
    threads: usize,
}

impl PhasedParallel {
    /// Group of `threads` workers (at least one).
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    /// Number of workers.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `body` on every worker and join them.
    ///
    /// Returns the first failure: an error returned by a worker, a worker
    /// panic, or a failing completion action.
    pub fn run<F>(&self, body: F) -> CorrelogramResult<()>
    where
        F: Fn(WorkerContext<'_>) -> CorrelogramResult<()> + Sync,
    {
        let barrier = PhaseBarrier::new(self.threads);
        let threads = self.threads;

        std::thread::scope(|scope| {
            for index in 0..threads {
                let barrier = &barrier;
                let body = &body;
                scope.spawn(move || {
                    let ctx = WorkerContext {
                        index,
                        threads,
                        barrier,
                    };
                    match catch_unwind(AssertUnwindSafe(|| body(ctx))) {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => barrier.break_with(err),
                        Err(payload) => barrier.break_with(CorrelogramError::WorkerFailed {
                            reason: format!("worker {} panicked: {}", index, panic_message(&*payload)),
                        }),
                    }
                });
            }
        });

        match barrier.broken() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_partition_covers_range() {
        for len in [0usize, 1, 5, 17, 100] {
            for parts in 1..=8 {
                let mut next = 0;
                for i in 0..parts {
                    let r = partition(len, parts, i);
                    assert_eq!(r.start, next);
                    assert!(r.len() <= len / parts + 1);
                    next = r.end;
                }
                assert_eq!(next, len);
            }
        }
    }

    #[test]
    fn test_action_runs_once_per_phase() {
        let actions = AtomicUsize::new(0);
        let arrivals = AtomicUsize::new(0);
        let phases = 25;
        PhasedParallel::new(4)
            .run(|ctx| {
                for phase in 0..phases {
                    arrivals.fetch_add(1, Ordering::SeqCst);
                    ctx.wait_then(|| {
                        // Everyone has arrived for this phase before the action runs.
                        assert_eq!(arrivals.load(Ordering::SeqCst), (phase + 1) * 4);
                        actions.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })?;
                    assert_eq!(actions.load(Ordering::SeqCst), phase + 1);
                    ctx.wait()?;
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(actions.load(Ordering::SeqCst), phases);
    }

    #[test]
    fn test_worker_panic_breaks_barrier() {
        let result = PhasedParallel::new(3).run(|ctx| {
            if ctx.index() == 1 {
                panic!("boom");
            }
            ctx.wait()?;
            ctx.wait()
        });
        match result {
            Err(CorrelogramError::WorkerFailed { reason }) => assert!(reason.contains("boom")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_failing_action_is_reported() {
        let result = PhasedParallel::new(2).run(|ctx| {
            ctx.wait_then(|| {
                Err(CorrelogramError::NumericalError {
                    reason: "bad column".to_string(),
                })
            })
        });
        assert_eq!(
            result,
            Err(CorrelogramError::NumericalError {
                reason: "bad column".to_string()
            })
        );
    }
}
