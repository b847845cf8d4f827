//! Background-operation layer.
//!
//! [`AsyncService`] owns the operations the HTTP handlers trigger. Each one
//! is submitted to the shared `TaskExecutor` and either returns nothing
//! (fire-and-forget) or a `TaskHandle` the caller can await.

pub mod async_service;
pub mod config;

pub use async_service::AsyncService;
pub use config::ServiceConfig;
