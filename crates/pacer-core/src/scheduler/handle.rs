//! SchedulerHandle - observe, stop and join a running drain loop.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::domain::{SchedulerState, StopReason};
use crate::error::SchedulerError;
use crate::observability::RunReport;

use super::RunCounters;

/// Handle returned by `Scheduler::perform`.
/// - `request_stop()` asks the loop to stop before the next pop
/// - `join()` waits for the run, then bounds the termination wait
/// - dropping the handle detaches the loop; it keeps draining
pub struct SchedulerHandle {
    state: Arc<watch::Sender<SchedulerState>>,
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<Result<RunReport, SchedulerError>>,
    counters: Arc<RunCounters>,
    config: SchedulerConfig,
}

impl SchedulerHandle {
    pub(crate) fn new(
        state: Arc<watch::Sender<SchedulerState>>,
        stop_tx: watch::Sender<bool>,
        join: JoinHandle<Result<RunReport, SchedulerError>>,
        counters: Arc<RunCounters>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            state,
            stop_tx,
            join,
            counters,
            config,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Tasks executed so far, failed ones included.
    pub fn executed(&self) -> usize {
        self.counters.executed()
    }

    /// Ask the loop to stop before its next pop.
    ///
    /// A pacing delay in progress is cut short. A task in flight is not
    /// interrupted; `join` waits for it up to the shutdown timeout.
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
        if advance(&self.state, SchedulerState::Running, SchedulerState::Stopping) {
            info!("scheduler stop requested");
        }
    }

    /// Request a stop, then wait for termination.
    pub async fn shutdown(self) -> Result<RunReport, SchedulerError> {
        self.request_stop();
        self.join().await
    }

    /// Wait for the run to end.
    ///
    /// Waits without bound while the loop is RUNNING. Once it is STOPPING the
    /// wait is bounded by `shutdown_timeout`, polled every `shutdown_poll`;
    /// past the bound the loop is aborted and the report carries
    /// `StopReason::TimedOut` with the number of cancelled tasks.
    ///
    /// # Errors
    /// - `SchedulerError::Fatal` when a task returned a fatal compute failure
    /// - `SchedulerError::Join` when the loop itself died
    pub async fn join(self) -> Result<RunReport, SchedulerError> {
        let Self {
            state,
            stop_tx: _stop_tx,
            mut join,
            counters,
            config,
        } = self;

        let mut watcher = state.subscribe();
        tokio::select! {
            biased;
            result = &mut join => return flatten(result),
            _ = async { let _ = watcher.wait_for(|s| s.is_winding_down()).await; } => {}
        }

        let timeout = config.shutdown_timeout();
        let poll = config.shutdown_poll();
        let deadline = Instant::now() + timeout;
        let mut ticker = interval_at(Instant::now() + poll, poll);

        loop {
            tokio::select! {
                biased;
                result = &mut join => return flatten(result),
                _ = ticker.tick() => {
                    if Instant::now() >= deadline {
                        break;
                    }
                    debug!(
                        in_flight = counters.in_flight(),
                        pending = counters.pending(),
                        "waiting for scheduler loop to finish"
                    );
                }
            }
        }

        join.abort();
        let cancelled = counters.pending() + usize::from(counters.in_flight());
        warn!(
            cancelled,
            timeout_ms = config.shutdown_timeout_ms,
            "scheduler did not terminate in time, cancelled outstanding work"
        );
        state.send_replace(SchedulerState::Terminated);
        Ok(counters.report(StopReason::TimedOut, cancelled))
    }
}

/// Move `state` from `from` to `to`; no-op (returns false) from any other state.
pub(crate) fn advance(
    state: &watch::Sender<SchedulerState>,
    from: SchedulerState,
    to: SchedulerState,
) -> bool {
    state.send_if_modified(|current| {
        if *current == from {
            *current = to;
            true
        } else {
            false
        }
    })
}

fn flatten(
    result: Result<Result<RunReport, SchedulerError>, JoinError>,
) -> Result<RunReport, SchedulerError> {
    result.map_err(|e| SchedulerError::Join(e.to_string()))?
}
