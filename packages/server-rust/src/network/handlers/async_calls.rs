//! Endpoints that trigger background operations.
//!
//! `/async` returns as soon as its task is queued. The other endpoints block
//! the request on one or more task handles and fold every failure into the
//! same fixed response body.

use axum::extract::State;
use axum::http::StatusCode;
use learn_async_core::{TaskError, TaskHandle};
use tracing::{error, info};

use super::AppState;
use crate::service::async_service::EXCEPTION_OCCURRED;

pub const ASYNC_CALLED: &str = "Async method called";

/// `GET /async` -- fire-and-forget.
pub async fn async_handler(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.service.async_method() {
        Ok(()) => {
            log_request_thread("/async");
            (StatusCode::OK, ASYNC_CALLED)
        }
        Err(err) => {
            error!(error = %err, "failed to submit async method");
            (StatusCode::SERVICE_UNAVAILABLE, EXCEPTION_OCCURRED)
        }
    }
}

/// `GET /async2` -- waits on a single task.
pub async fn async_result_handler(State(state): State<AppState>) -> String {
    match wait_for(state.service.async_method_with_result()).await {
        Ok(result) => format!("Async method result: {result}"),
        Err(err) => failure_response(&err),
    }
}

/// `GET /async3` -- submits two tasks, then waits for both.
pub async fn async_joined_handler(State(state): State<AppState>) -> String {
    // Both are queued before either is awaited so they overlap.
    let submitted = (
        state.service.async_method1(),
        state.service.async_method2(),
    );
    let joined = match submitted {
        (Ok(first), Ok(second)) => join_both(first, second).await,
        (Err(err), _) | (_, Err(err)) => Err(err),
    };
    match joined {
        Ok((first, second)) => format!("Results: {first}, {second}"),
        Err(err) => failure_response(&err),
    }
}

/// `GET /async4` -- the task recovers from its own failure and completes
/// with a fallback value.
pub async fn async_exception_handler(State(state): State<AppState>) -> String {
    match wait_for(state.service.async_method_with_exception_handling()).await {
        Ok(result) => format!("Async method result: {result}"),
        Err(err) => failure_response(&err),
    }
}

/// `GET /async5` -- the task fails and the failure reaches the caller.
pub async fn async_failing_handler(State(state): State<AppState>) -> String {
    match wait_for(state.service.async_method_failing()).await {
        Ok(result) => format!("Async method result: {result}"),
        Err(err) => failure_response(&err),
    }
}

async fn wait_for<T>(submitted: Result<TaskHandle<T>, TaskError>) -> Result<T, TaskError> {
    submitted?.await
}

/// Waits for both tasks to settle, then reports the first failure if any.
async fn join_both<A, B>(first: TaskHandle<A>, second: TaskHandle<B>) -> Result<(A, B), TaskError> {
    let (first, second) = tokio::join!(first, second);
    Ok((first?, second?))
}

fn failure_response(err: &TaskError) -> String {
    error!(
        error = %err,
        interrupted = err.is_interrupted(),
        "async call failed"
    );
    EXCEPTION_OCCURRED.to_string()
}

fn log_request_thread(route: &str) {
    let thread = std::thread::current();
    info!(route, thread = thread.name().unwrap_or("unnamed"), "ok");
}
