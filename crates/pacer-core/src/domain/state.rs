//! Scheduler lifecycle.

use serde::{Deserialize, Serialize};

/// Scheduler state.
///
/// State transitions:
/// - Idle -> Running (`perform`)
/// - Running -> Stopping (STOP returned, tracks exhausted, fatal task error, or shutdown requested)
/// - Stopping -> Terminated (loop finished, or force-cancelled after the shutdown timeout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Terminated,
}

impl SchedulerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SchedulerState::Terminated)
    }

    /// Has the run stopped scheduling new work?
    pub fn is_winding_down(self) -> bool {
        matches!(self, SchedulerState::Stopping | SchedulerState::Terminated)
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every track drained.
    Exhausted,

    /// A task returned `Action::Stop`.
    Stopped,

    /// `SchedulerHandle::shutdown` was called.
    ShutdownRequested,

    /// A task returned a fatal compute failure.
    Fatal,

    /// The loop didn't finish within the shutdown bound and was cancelled.
    TimedOut,
}
