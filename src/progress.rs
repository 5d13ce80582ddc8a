//! Progress reporting and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lifecycle of a matrix computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ComputationPhase {
    /// Not started yet.
    Idle,
    /// Filling the lag-window cache for the current base window.
    Precomputing,
    /// Writing correlation cells for the current base window.
    Computing,
    /// Aggregating the current base window into a column.
    Aggregating,
    /// Every base window was aggregated.
    Done,
    /// Stopped by a cancellation request.
    Cancelled,
    /// A worker failed.
    Failed,
}

impl ComputationPhase {
    /// True for `Done`, `Cancelled` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ComputationPhase::Done | ComputationPhase::Cancelled | ComputationPhase::Failed
        )
    }
}

/// Receives one notification per aggregated column.
///
/// Called from whichever worker runs the aggregation, so implementations
/// must be thread-safe and should return quickly.
pub trait ProgressListener: Send + Sync {
    /// `completed` of `total` base windows are aggregated.
    fn on_progress(&self, completed: usize, total: usize, status: &str);
}

impl ProgressListener for () {
    fn on_progress(&self, _completed: usize, _total: usize, _status: &str) {}
}

impl<F> ProgressListener for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize, status: &str) {
        self(completed, total, status)
    }
}

/// Shared cancellation flag, checked between base windows.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// True once [`cancel`](Self::cancel) was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_token_clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_closure_listener() {
        let calls = AtomicUsize::new(0);
        let listener = |done: usize, total: usize, _: &str| {
            assert!(done <= total);
            calls.fetch_add(1, Ordering::Relaxed);
        };
        listener.on_progress(1, 2, "window 1 of 2");
        listener.on_progress(2, 2, "window 2 of 2");
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert!(ComputationPhase::Cancelled.is_terminal());
        assert!(!ComputationPhase::Computing.is_terminal());
    }
}
