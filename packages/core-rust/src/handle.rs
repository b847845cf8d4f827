//! Future handle for a submitted task.
//!
//! A `TaskHandle<T>` is the receiving end of a oneshot channel completed by
//! the worker that runs the task. It can be queried without blocking via
//! [`TaskHandle::state`] and is consumed exactly once by awaiting it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::error::TaskError;

/// Completion state of a [`TaskHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// The task has not produced an outcome yet.
    Pending,
    /// The task finished and produced a value.
    Completed,
    /// The task failed, panicked, or was dropped.
    Failed,
}

impl TaskState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Pending or completed result of a task submitted to a [`crate::TaskExecutor`].
///
/// Awaiting the handle suspends the caller until the task completes. A
/// handle whose task is dropped before completing resolves to
/// `TaskError::Interrupted`.
#[derive(Debug)]
#[must_use = "a task handle does nothing unless awaited or queried"]
pub struct TaskHandle<T> {
    task_id: u64,
    rx: oneshot::Receiver<Result<T, TaskError>>,
    // Outcome observed by `state()` before the handle was awaited.
    outcome: Option<Result<T, TaskError>>,
}

// The value is only moved out, never pinned in place.
impl<T> Unpin for TaskHandle<T> {}

impl<T> TaskHandle<T> {
    pub(crate) fn new(task_id: u64, rx: oneshot::Receiver<Result<T, TaskError>>) -> Self {
        Self {
            task_id,
            rx,
            outcome: None,
        }
    }

    /// Identifier assigned by the executor at submission.
    #[must_use]
    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    /// Returns the current completion state without blocking.
    pub fn state(&mut self) -> TaskState {
        if self.outcome.is_none() {
            match self.rx.try_recv() {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(TryRecvError::Empty) => return TaskState::Pending,
                Err(TryRecvError::Closed) => self.outcome = Some(Err(TaskError::Interrupted)),
            }
        }
        match self.outcome {
            Some(Ok(_)) => TaskState::Completed,
            Some(Err(_)) => TaskState::Failed,
            None => TaskState::Pending,
        }
    }

    /// Waits for the task to finish and returns its outcome.
    ///
    /// # Errors
    ///
    /// Returns the task's `TaskError` if it failed, panicked, or was
    /// dropped before completing.
    pub async fn wait(self) -> Result<T, TaskError> {
        self.await
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        if let Some(outcome) = this.outcome.take() {
            return Poll::Ready(outcome);
        }
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::Interrupted)),
            Poll::Pending => Poll::Pending,
        }
    }
}
