//! Scheduler: drains tracks of tasks one at a time, pacing between live calls.
//!
//! Exactly one task is in flight at any moment. After each task the returned
//! `Action` decides what happens next:
//! - `WaitAndContinue`: sleep `task_delay`, then pop the next task
//! - `SkipDelay`: pop the next task immediately
//! - `Stop`: end the run
//!
//! A task that fails (`TaskError::Failed`) or panics is logged and paced like
//! `WaitAndContinue`; it is not retried. `TaskError::Fatal` ends the run and is
//! returned from `SchedulerHandle::join`.

pub mod handle;
pub mod task;
pub mod track;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::domain::{Action, SchedulerState, StopReason, TaskContext};
use crate::error::{SchedulerError, TaskError};
use crate::observability::RunReport;

pub use self::handle::SchedulerHandle;
pub use self::task::{FnTask, Task, task_fn};
pub use self::track::Track;

pub struct Scheduler<D = ()>
where
    D: Send + Sync + 'static,
{
    config: SchedulerConfig,
    context: Arc<TaskContext<D>>,
    tracks: Vec<Track<D>>,
    state: Arc<watch::Sender<SchedulerState>>,
}

impl Scheduler<()> {
    /// Scheduler with a no-op context.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_context(config, Arc::new(TaskContext::noop()))
    }
}

impl<D> Scheduler<D>
where
    D: Send + Sync + 'static,
{
    /// Scheduler sharing `context` with its tasks. Keep a clone of the `Arc`
    /// to read progress while the run is going.
    pub fn with_context(config: SchedulerConfig, context: Arc<TaskContext<D>>) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            config,
            context,
            tracks: Vec::new(),
            state: Arc::new(state),
        }
    }

    /// # Errors
    /// `SchedulerError::NoTracks` when `tracks` is empty.
    pub fn from_tracks(
        config: SchedulerConfig,
        context: Arc<TaskContext<D>>,
        tracks: Vec<Track<D>>,
    ) -> Result<Self, SchedulerError> {
        if tracks.is_empty() {
            return Err(SchedulerError::NoTracks);
        }
        let mut scheduler = Self::with_context(config, context);
        scheduler.tracks = tracks;
        Ok(scheduler)
    }

    /// Open a new track; subsequent `add` calls append to it.
    pub fn add_track(&mut self, name: impl Into<String>) -> &mut Self {
        self.tracks.push(Track::new(name));
        self
    }

    pub fn push_track(&mut self, track: Track<D>) -> &mut Self {
        self.tracks.push(track);
        self
    }

    /// Append to the last track, opening one if there is none yet.
    pub fn add(&mut self, task: impl Task<D> + 'static) -> &mut Self {
        self.current_track().push(task);
        self
    }

    pub fn add_fn<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(Arc<TaskContext<D>>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Action, TaskError>> + Send + 'static,
    {
        self.current_track().push_fn(f);
        self
    }

    pub fn tracks(&self) -> &[Track<D>] {
        &self.tracks
    }

    /// Tasks queued across all tracks.
    pub fn total_len(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }

    pub fn context(&self) -> &Arc<TaskContext<D>> {
        &self.context
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Start draining on a spawned tokio task.
    ///
    /// The context's `size` is the task count of the first track only; later
    /// tracks still advance `index`.
    ///
    /// # Errors
    /// `SchedulerError::NoTracks` when nothing was added.
    pub fn perform(self) -> Result<SchedulerHandle, SchedulerError> {
        let Self {
            config,
            context,
            tracks,
            state,
        } = self;

        let Some(first) = tracks.first() else {
            return Err(SchedulerError::NoTracks);
        };
        let size = first.len();
        let total: usize = tracks.iter().map(Track::len).sum();

        context.start(size);
        state.send_replace(SchedulerState::Running);
        info!(
            tracks = tracks.len(),
            size,
            total,
            task_delay_ms = config.task_delay_ms,
            "scheduler run started"
        );

        let counters = Arc::new(RunCounters::with_pending(total));
        let (stop_tx, stop_rx) = watch::channel(false);
        let drain = Drain {
            tracks,
            context,
            delay: config.task_delay(),
            state: Arc::clone(&state),
            stop_rx,
            counters: Arc::clone(&counters),
        };
        let join = tokio::spawn(drain.run());

        Ok(SchedulerHandle::new(state, stop_tx, join, counters, config))
    }

    /// `perform` then `join`.
    pub async fn run(self) -> Result<RunReport, SchedulerError> {
        self.perform()?.join().await
    }

    fn current_track(&mut self) -> &mut Track<D> {
        if self.tracks.is_empty() {
            self.tracks.push(Track::new("default"));
        }
        let last = self.tracks.len() - 1;
        &mut self.tracks[last]
    }
}

/// Counters shared between the drain loop and its handle.
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    executed: AtomicUsize,
    failed: AtomicUsize,
    paced: AtomicUsize,
    unpaced: AtomicUsize,
    pending: AtomicUsize,
    in_flight: AtomicBool,
}

impl RunCounters {
    fn with_pending(pending: usize) -> Self {
        Self {
            pending: AtomicUsize::new(pending),
            ..Self::default()
        }
    }

    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn begin_task(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
        self.in_flight.store(true, Ordering::Release);
    }

    fn end_task(&self) {
        self.in_flight.store(false, Ordering::Release);
        self.executed.fetch_add(1, Ordering::AcqRel);
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::AcqRel);
    }

    pub fn report(&self, reason: StopReason, cancelled: usize) -> RunReport {
        RunReport {
            reason,
            executed: self.executed(),
            failed: self.failed.load(Ordering::Acquire),
            paced: self.paced.load(Ordering::Acquire),
            unpaced: self.unpaced.load(Ordering::Acquire),
            remaining: self.pending(),
            cancelled,
        }
    }
}

/// State owned by the spawned drain loop.
struct Drain<D>
where
    D: Send + Sync + 'static,
{
    tracks: Vec<Track<D>>,
    context: Arc<TaskContext<D>>,
    delay: Duration,
    state: Arc<watch::Sender<SchedulerState>>,
    stop_rx: watch::Receiver<bool>,
    counters: Arc<RunCounters>,
}

impl<D> Drain<D>
where
    D: Send + Sync + 'static,
{
    async fn run(mut self) -> Result<RunReport, SchedulerError> {
        let mut current = 0;
        let mut fatal = None;

        let reason = loop {
            if self.stop_requested() {
                break StopReason::ShutdownRequested;
            }
            let Some(task) = self.next_task(&mut current) else {
                break StopReason::Exhausted;
            };

            let index = self.context.index();
            self.counters.begin_task();
            let outcome = AssertUnwindSafe(task.run(Arc::clone(&self.context)))
                .catch_unwind()
                .await;
            self.counters.end_task();

            if let Ok(Ok(action)) = &outcome {
                self.context.record(*action);
            }
            self.context.advance();

            let action = match outcome {
                Ok(Ok(action)) => {
                    debug!(track = current, index, action = ?action, "task finished");
                    Some(action)
                }
                Ok(Err(TaskError::Fatal(err))) => {
                    RunCounters::bump(&self.counters.failed);
                    error!(track = current, index, error = %err, "fatal task failure, aborting run");
                    fatal = Some(err);
                    break StopReason::Fatal;
                }
                Ok(Err(TaskError::Failed(reason))) => {
                    RunCounters::bump(&self.counters.failed);
                    warn!(track = current, index, reason = %reason, "task failed, continuing");
                    None
                }
                Err(panic) => {
                    RunCounters::bump(&self.counters.failed);
                    error!(
                        track = current,
                        index,
                        panic = panic_message(panic.as_ref()),
                        "task panicked, continuing"
                    );
                    None
                }
            };

            // failed tasks pace like WaitAndContinue
            let action = action.unwrap_or(Action::WaitAndContinue);
            if action.is_stop() {
                break StopReason::Stopped;
            }
            if action.paces() {
                RunCounters::bump(&self.counters.paced);
                self.pace().await;
            } else {
                RunCounters::bump(&self.counters.unpaced);
            }
        };

        handle::advance(&self.state, SchedulerState::Running, SchedulerState::Stopping);
        let report = self.counters.report(reason, 0);
        info!(
            reason = ?reason,
            executed = report.executed,
            failed = report.failed,
            remaining = report.remaining,
            "scheduler run finished"
        );
        self.state.send_replace(SchedulerState::Terminated);

        match fatal {
            Some(err) => Err(SchedulerError::Fatal(err)),
            None => Ok(report),
        }
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Pop from the current track, moving past drained tracks.
    fn next_task(&mut self, current: &mut usize) -> Option<Box<dyn Task<D>>> {
        while let Some(track) = self.tracks.get_mut(*current) {
            if let Some(task) = track.pop() {
                return Some(task);
            }
            *current += 1;
            if let Some(next) = self.tracks.get(*current) {
                debug!(
                    track = *current,
                    name = next.name(),
                    queued = next.len(),
                    "advancing to next track"
                );
            }
        }
        None
    }

    /// Inter-task delay, cut short by a stop request.
    async fn pace(&mut self) {
        let sleep = tokio::time::sleep(self.delay);
        tokio::pin!(sleep);

        tokio::select! {
            _ = &mut sleep => {}
            changed = self.stop_rx.changed() => {
                // handle dropped: nobody can stop us, keep pacing
                if changed.is_err() {
                    sleep.await;
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
