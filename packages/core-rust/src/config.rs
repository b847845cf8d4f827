//! Configuration for the bounded task executor.

use std::time::Duration;

use crate::error::TaskError;

/// Sizing and naming for a [`crate::TaskExecutor`].
///
/// The pool runs at most `pool_size` tasks at once. Up to `queue_capacity`
/// further tasks wait for a free worker; anything beyond that is rejected.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Pool name used in logs, metrics labels, and errors.
    pub name: String,
    /// Number of worker tasks.
    pub pool_size: usize,
    /// Capacity of the queue of submitted, not-yet-started tasks.
    pub queue_capacity: usize,
    /// Workers are named `{thread_name_prefix}{n}`, `n` starting at 1.
    pub thread_name_prefix: String,
    /// How long `shutdown()` waits for queued and running tasks before
    /// aborting the workers.
    pub await_termination: Duration,
}

impl ExecutorConfig {
    /// Checks that the pool can make progress.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::InvalidConfig` if `pool_size` or `queue_capacity`
    /// is zero.
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.pool_size == 0 {
            return Err(TaskError::InvalidConfig(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(TaskError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn worker_name(&self, index: usize) -> String {
        format!("{}{}", self.thread_name_prefix, index + 1)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "taskExecutor".to_string(),
            pool_size: 8,
            queue_capacity: 100,
            thread_name_prefix: "task-".to_string(),
            await_termination: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_config_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.name, "taskExecutor");
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.thread_name_prefix, "task-");
        assert_eq!(config.await_termination, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_pool_size_is_invalid() {
        let config = ExecutorConfig {
            pool_size: 0,
            ..ExecutorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TaskError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_queue_capacity_is_invalid() {
        let config = ExecutorConfig {
            queue_capacity: 0,
            ..ExecutorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn worker_names_are_one_based() {
        let config = ExecutorConfig::default();
        assert_eq!(config.worker_name(0), "task-1");
        assert_eq!(config.worker_name(7), "task-8");
    }
}
