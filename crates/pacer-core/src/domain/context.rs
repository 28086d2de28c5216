//! Run-state shared between the scheduler and every task it runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::action::Action;

/// Progress of the current run plus an optional caller payload `D`.
///
/// The scheduler owns the writes: `index` goes up by one per executed task
/// (failed ones included), `size` is set once when the run starts and
/// `last_action` holds the most recent action a task returned. Callers keep
/// an `Arc` clone to read progress from outside the run.
#[derive(Debug, Default)]
pub struct TaskContext<D = ()> {
    index: AtomicUsize,
    size: AtomicUsize,
    last_action: Mutex<Option<Action>>,
    data: D,
}

impl TaskContext<()> {
    /// Context for callers that don't need progress reporting.
    pub fn noop() -> Self {
        Self::new(())
    }
}

impl<D> TaskContext<D> {
    pub fn new(data: D) -> Self {
        Self {
            index: AtomicUsize::new(0),
            size: AtomicUsize::new(0),
            last_action: Mutex::new(None),
            data,
        }
    }

    /// Number of tasks executed so far in this run.
    pub fn index(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    /// Task count of the first track, captured when the run started.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn last_action(&self) -> Option<Action> {
        *self
            .last_action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    /// `index / size` as a fraction; 0.0 before the run or for an empty first track.
    pub fn progress(&self) -> f64 {
        match self.size() {
            0 => 0.0,
            size => self.index() as f64 / size as f64,
        }
    }

    pub(crate) fn start(&self, size: usize) {
        self.index.store(0, Ordering::Release);
        self.size.store(size, Ordering::Release);
    }

    pub(crate) fn record(&self, action: Action) {
        *self
            .last_action
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(action);
    }

    pub(crate) fn advance(&self) {
        self.index.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_resets_index_and_sets_size() {
        let ctx = TaskContext::noop();
        ctx.advance();
        ctx.advance();
        ctx.start(7);
        assert_eq!(ctx.index(), 0);
        assert_eq!(ctx.size(), 7);
    }

    #[test]
    fn record_and_advance_are_independent() {
        let ctx = TaskContext::new("wallets");
        assert_eq!(ctx.last_action(), None);
        ctx.record(Action::SkipDelay);
        ctx.advance();
        assert_eq!(ctx.last_action(), Some(Action::SkipDelay));
        assert_eq!(ctx.index(), 1);
        assert_eq!(*ctx.data(), "wallets");
    }

    #[test]
    fn progress_handles_empty_size() {
        let ctx = TaskContext::noop();
        assert_eq!(ctx.progress(), 0.0);
        ctx.start(4);
        ctx.advance();
        assert_eq!(ctx.progress(), 0.25);
    }
}
