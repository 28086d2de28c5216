use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::domain::{Action, TaskContext};
use crate::error::TaskError;

use super::task::{Task, task_fn};

/// FIFO queue of tasks. Tracks are drained one after another, in order.
pub struct Track<D = ()>
where
    D: Send + Sync + 'static,
{
    name: String,
    tasks: VecDeque<Box<dyn Task<D>>>,
}

impl<D> Track<D>
where
    D: Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push(&mut self, task: impl Task<D> + 'static) -> &mut Self {
        self.tasks.push_back(Box::new(task));
        self
    }

    pub fn push_fn<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(Arc<TaskContext<D>>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Action, TaskError>> + Send + 'static,
    {
        self.push(task_fn(f))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn pop(&mut self) -> Option<Box<dyn Task<D>>> {
        self.tasks.pop_front()
    }
}

impl<D> fmt::Debug for Track<D>
where
    D: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("name", &self.name)
            .field("len", &self.tasks.len())
            .finish()
    }
}
