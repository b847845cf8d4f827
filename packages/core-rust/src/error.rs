//! Error taxonomy for submitted tasks and their handles.

/// Errors produced by the executor or observed through a [`crate::TaskHandle`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The task was dropped before it produced a result (executor shut down
    /// or the worker was aborted while the caller was waiting).
    #[error("wait interrupted: task dropped before completion")]
    Interrupted,
    /// The operation itself returned an error.
    #[error("task failed: {message}")]
    Failed { message: String },
    /// The operation panicked. The worker survives and keeps serving.
    #[error("task panicked: {message}")]
    Panicked { message: String },
    /// The bounded queue was full when the task was submitted.
    #[error("executor '{executor}' rejected task: queue capacity {queue_capacity} exhausted")]
    Rejected {
        executor: String,
        queue_capacity: usize,
    },
    /// The executor no longer accepts work.
    #[error("executor '{executor}' is shut down")]
    Shutdown { executor: String },
    #[error("invalid executor configuration: {0}")]
    InvalidConfig(String),
}

impl TaskError {
    /// Returns `true` when the caller's wait ended without an outcome, as
    /// opposed to the operation reporting a failure of its own.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}
