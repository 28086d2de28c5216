//! What a finished task asks the scheduler to do next.

use serde::{Deserialize, Serialize};

/// Backpressure hint returned by every task.
///
/// Serialized as SCREAMING_SNAKE_CASE: WAIT_AND_CONTINUE / SKIP_DELAY / STOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// A live call consumed remote quota; pace before the next task.
    WaitAndContinue,

    /// Nothing hit the remote side; run the next task immediately.
    SkipDelay,

    /// Terminal. No further task executes.
    Stop,
}

impl Action {
    pub fn is_stop(self) -> bool {
        matches!(self, Action::Stop)
    }

    /// Whether the scheduler waits its inter-task delay after this action.
    pub fn paces(self) -> bool {
        matches!(self, Action::WaitAndContinue)
    }
}
