//! Network module with deferred startup lifecycle.
//!
//! `new()` allocates shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until the shutdown signal fires, then
//! drains blocking requests and the task executor.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    async_exception_handler, async_failing_handler, async_handler, async_joined_handler,
    async_result_handler, health_handler, liveness_handler, readiness_handler, AppState,
};
use super::middleware::{build_http_layers, track_in_flight};
use super::shutdown::ShutdownController;
use crate::service::AsyncService;

/// Manages the HTTP server lifecycle.
///
/// Follows the deferred startup pattern:
/// 1. `new()` -- allocates shared state (shutdown controller)
/// 2. `start()` -- binds TCP listener to the configured address
/// 3. `serve()` -- accepts connections until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    service: Arc<AsyncService>,
    shutdown: Arc<ShutdownController>,
    start_time: Instant,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, service: Arc<AsyncService>) -> Self {
        Self {
            config,
            listener: None,
            service,
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
        }
    }

    /// Returns a shared reference to the shutdown controller.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /async` -- fire-and-forget task
    /// - `GET /async2` -- waits on one task
    /// - `GET /async3` -- waits on two concurrent tasks
    /// - `GET /async4` -- task that recovers from its own failure
    /// - `GET /async5` -- task whose failure reaches the caller
    /// - `GET /health`, `/health/live`, `/health/ready` -- probes
    pub fn build_router(&self) -> Router {
        let state = AppState {
            service: Arc::clone(&self.service),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
        };

        // Probes stay reachable while draining; task endpoints do not.
        let calls = Router::new()
            .route("/async", get(async_handler))
            .route("/async2", get(async_result_handler))
            .route("/async3", get(async_joined_handler))
            .route("/async4", get(async_exception_handler))
            .route("/async5", get(async_failing_handler))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                track_in_flight,
            ));

        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .merge(calls)
            .layer(build_http_layers(&self.config))
            .with_state(state)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which differs from the configured one
    /// when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves.
    ///
    /// After the signal:
    /// 1. Health state moves to Draining and task endpoints answer 503
    /// 2. Waits up to `drain_timeout` for in-flight requests
    /// 3. Shuts the executor down, letting queued tasks finish
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();

        let controller = Arc::clone(&self.shutdown);
        let signal = async move {
            shutdown.await;
            info!("shutdown signal received");
            controller.trigger_shutdown();
        };

        self.shutdown.set_ready();
        info!("Serving HTTP connections");

        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await?;

        self.drain().await;
        Ok(())
    }

    async fn drain(&self) {
        // Covers the case where axum stopped without our signal firing.
        self.shutdown.trigger_shutdown();

        if self.shutdown.wait_for_drain(self.config.drain_timeout).await {
            info!("All requests drained successfully");
        } else {
            warn!(
                in_flight = self.shutdown.in_flight_count(),
                "Drain timeout expired with in-flight requests remaining"
            );
        }

        self.service.executor().shutdown().await;
    }
}
