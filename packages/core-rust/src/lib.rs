//! `learn-async` core — bounded task executor, future handles, and task errors.

pub mod config;
pub mod error;
pub mod executor;
pub mod handle;

pub use config::ExecutorConfig;
pub use error::TaskError;
pub use executor::{ExecutorStats, TaskExecutor};
pub use handle::{TaskHandle, TaskState};
