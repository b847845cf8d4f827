//! Background operations dispatched onto the shared task executor.
//!
//! Every operation is stateless: it sleeps for its configured delay to stand
//! in for real work, then produces a fixed string (or nothing). Submission
//! returns immediately; callers decide whether to await the handle.

use std::sync::Arc;
use std::time::Duration;

use learn_async_core::{TaskError, TaskExecutor, TaskHandle};
use tracing::{error, info};

use super::config::ServiceConfig;

pub const ASYNC_RESULT: &str = "Async result";
pub const METHOD1_RESULT: &str = "Result from asyncMethod1";
pub const METHOD2_RESULT: &str = "Result from asyncMethod2";
/// Fallback value produced when a task recovers from its own failure.
pub const EXCEPTION_OCCURRED: &str = "Exception occurred!";

/// Operations that run on the executor instead of the request task.
pub struct AsyncService {
    executor: Arc<TaskExecutor>,
    config: ServiceConfig,
}

impl AsyncService {
    #[must_use]
    pub fn new(executor: Arc<TaskExecutor>, config: ServiceConfig) -> Self {
        Self { executor, config }
    }

    /// The executor all operations are submitted to.
    #[must_use]
    pub fn executor(&self) -> &Arc<TaskExecutor> {
        &self.executor
    }

    /// Fire-and-forget: simulates work and logs, producing no result.
    ///
    /// # Errors
    ///
    /// Returns an error if the executor rejects the submission.
    pub fn async_method(&self) -> Result<(), TaskError> {
        let delay = self.config.async_method_delay;
        self.executor.execute(async move {
            info!("executing method asynchronously");
            tokio::time::sleep(delay).await;
            info!("async method finished");
        })
    }

    /// Simulates work and resolves to [`ASYNC_RESULT`].
    ///
    /// # Errors
    ///
    /// Returns an error if the executor rejects the submission.
    pub fn async_method_with_result(&self) -> Result<TaskHandle<String>, TaskError> {
        let delay = self.config.async_method_with_result_delay;
        self.executor.submit(async move {
            info!("executing method asynchronously");
            tokio::time::sleep(delay).await;
            info!("async method finished");
            Ok(ASYNC_RESULT.to_string())
        })
    }

    /// # Errors
    ///
    /// Returns an error if the executor rejects the submission.
    pub fn async_method1(&self) -> Result<TaskHandle<String>, TaskError> {
        self.submit_fixed(self.config.async_method1_delay, METHOD1_RESULT)
    }

    /// # Errors
    ///
    /// Returns an error if the executor rejects the submission.
    pub fn async_method2(&self) -> Result<TaskHandle<String>, TaskError> {
        self.submit_fixed(self.config.async_method2_delay, METHOD2_RESULT)
    }

    /// Runs the always-failing operation and recovers inside the task, so
    /// the handle completes with [`EXCEPTION_OCCURRED`] instead of failing.
    ///
    /// # Errors
    ///
    /// Returns an error if the executor rejects the submission.
    pub fn async_method_with_exception_handling(
        &self,
    ) -> Result<TaskHandle<String>, TaskError> {
        let delay = self.config.simulated_failure_delay;
        self.executor.submit(async move {
            match simulated_failure(delay).await {
                Ok(value) => Ok(value),
                Err(err) => {
                    error!(error = %err, "operation failed, returning fallback");
                    Ok(EXCEPTION_OCCURRED.to_string())
                }
            }
        })
    }

    /// Runs the always-failing operation and lets the error escape the task,
    /// so the handle resolves to `TaskError::Failed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the executor rejects the submission.
    pub fn async_method_failing(&self) -> Result<TaskHandle<String>, TaskError> {
        self.executor
            .submit(simulated_failure(self.config.simulated_failure_delay))
    }

    fn submit_fixed(
        &self,
        delay: Duration,
        result: &'static str,
    ) -> Result<TaskHandle<String>, TaskError> {
        self.executor.submit(async move {
            tokio::time::sleep(delay).await;
            Ok(result.to_string())
        })
    }
}

/// Simulates work, then fails unconditionally.
async fn simulated_failure(delay: Duration) -> anyhow::Result<String> {
    tokio::time::sleep(delay).await;
    anyhow::bail!("Simulated exception")
}
