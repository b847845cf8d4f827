//! `learn-async` binary: parses configuration, starts the executor, and
//! serves HTTP until Ctrl-C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use learn_async_core::{ExecutorConfig, TaskExecutor};
use learn_async_server::telemetry::{init_tracing, LogFormat};
use learn_async_server::{AsyncService, NetworkConfig, NetworkModule, ServiceConfig};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "learn-async", version, about = "Asynchronous method invocation over HTTP")]
struct Args {
    /// Bind address.
    #[arg(long, env = "LEARN_ASYNC_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port (0 picks a free port).
    #[arg(long, env = "LEARN_ASYNC_PORT", default_value_t = 8080)]
    port: u16,

    /// Number of executor workers.
    #[arg(long, env = "LEARN_ASYNC_POOL_SIZE", default_value_t = 8)]
    pool_size: usize,

    /// Tasks that may wait for a free worker before submissions are rejected.
    #[arg(long, env = "LEARN_ASYNC_QUEUE_CAPACITY", default_value_t = 100)]
    queue_capacity: usize,

    #[arg(long, env = "LEARN_ASYNC_THREAD_NAME_PREFIX", default_value = "task-")]
    thread_name_prefix: String,

    /// Upper bound on request handling time, in seconds.
    #[arg(long, env = "LEARN_ASYNC_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    #[arg(long, env = "LEARN_ASYNC_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

impl Args {
    fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            pool_size: self.pool_size,
            queue_capacity: self.queue_capacity,
            thread_name_prefix: self.thread_name_prefix.clone(),
            ..ExecutorConfig::default()
        }
    }

    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..NetworkConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let executor = Arc::new(TaskExecutor::start(args.executor_config())?);
    let service = Arc::new(AsyncService::new(executor, ServiceConfig::default()));

    let mut network = NetworkModule::new(args.network_config(), service);
    let port = network.start().await?;
    info!(port, "learn-async listening");

    network.serve(shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
