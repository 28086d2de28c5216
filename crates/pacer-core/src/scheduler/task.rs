//! Task trait - one unit of work drained by the `Scheduler`.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Action, TaskContext};
use crate::error::TaskError;

/// A task runs once, reads run progress from the shared context, and tells the
/// scheduler what to do next.
///
/// # Example
/// ```ignore
/// struct FetchBlock { cache: Arc<ComputeCache>, height: u64 }
///
/// #[async_trait]
/// impl Task for FetchBlock {
///     async fn run(self: Box<Self>, _ctx: Arc<TaskContext>) -> Result<Action, TaskError> {
///         let envelope = self.cache.fetch(&identity(self.height), || rpc(self.height)).await?;
///         Ok(envelope.hint())
///     }
/// }
/// ```
///
/// `self: Box<Self>` keeps the trait object-safe while letting the body move
/// out of its own fields.
#[async_trait]
pub trait Task<D = ()>: Send
where
    D: Send + Sync + 'static,
{
    async fn run(self: Box<Self>, ctx: Arc<TaskContext<D>>) -> Result<Action, TaskError>;
}

/// Adapter turning an async closure into a `Task`.
pub struct FnTask<F>(F);

/// Wrap `f` as a `Task`.
pub fn task_fn<F>(f: F) -> FnTask<F> {
    FnTask(f)
}

#[async_trait]
impl<D, F, Fut> Task<D> for FnTask<F>
where
    D: Send + Sync + 'static,
    F: FnOnce(Arc<TaskContext<D>>) -> Fut + Send,
    Fut: Future<Output = Result<Action, TaskError>> + Send,
{
    async fn run(self: Box<Self>, ctx: Arc<TaskContext<D>>) -> Result<Action, TaskError> {
        (self.0)(ctx).await
    }
}
