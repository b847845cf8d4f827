//! Bounded task executor backed by a fixed set of tokio worker tasks.
//!
//! Submitted tasks go into a bounded mpsc queue shared by `pool_size`
//! workers. Each worker pulls one task at a time, so at most `pool_size`
//! tasks run concurrently. Submission never waits: a full queue rejects the
//! task immediately.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::ExecutorConfig;
use crate::error::TaskError;
use crate::handle::TaskHandle;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

struct QueuedJob {
    task_id: u64,
    job: Job,
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedJob>>>;

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Counters {
    active: AtomicUsize,
    queued: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time snapshot of executor activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    pub pool_size: usize,
    pub active: usize,
    pub queued: usize,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
}

// ---------------------------------------------------------------------------
// TaskExecutor
// ---------------------------------------------------------------------------

/// Named worker pool accepting fire-and-forget and result-bearing tasks.
///
/// Tasks run inside a `task` tracing span carrying the executor name, the
/// worker name, and the task id, so anything a task logs identifies the
/// worker it ran on.
pub struct TaskExecutor {
    config: ExecutorConfig,
    tx: Mutex<Option<mpsc::Sender<QueuedJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
    next_task_id: AtomicU64,
}

impl TaskExecutor {
    /// Validates the configuration and spawns the worker tasks.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::InvalidConfig` if the configuration cannot make
    /// progress.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(config: ExecutorConfig) -> Result<Self, TaskError> {
        config.validate()?;

        let (tx, rx) = mpsc::channel::<QueuedJob>(config.queue_capacity);
        let rx: SharedReceiver = Arc::new(tokio::sync::Mutex::new(rx));
        let counters = Arc::new(Counters::default());

        let workers = (0..config.pool_size)
            .map(|index| {
                tokio::spawn(worker_loop(
                    config.name.clone(),
                    config.worker_name(index),
                    Arc::clone(&rx),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        info!(
            executor = %config.name,
            pool_size = config.pool_size,
            queue_capacity = config.queue_capacity,
            "task executor started"
        );

        Ok(Self {
            config,
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            counters,
            next_task_id: AtomicU64::new(1),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Submits a task whose outcome is delivered through the returned handle.
    ///
    /// Returns as soon as the task is queued. An `Err` from the operation
    /// resolves the handle to `TaskError::Failed`; a panic resolves it to
    /// `TaskError::Panicked`.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::Rejected` if the queue is full, or
    /// `TaskError::Shutdown` after [`TaskExecutor::shutdown`].
    pub fn submit<F, T>(&self, operation: F) -> Result<TaskHandle<T>, TaskError>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let counters = Arc::clone(&self.counters);
        let executor = self.config.name.clone();

        let job = Box::pin(async move {
            let outcome = run_guarded(operation, &counters, &executor).await;
            // The caller may have stopped waiting; the outcome is then dropped.
            let _ = tx.send(outcome);
        });

        self.enqueue(QueuedJob { task_id, job })?;
        Ok(TaskHandle::new(task_id, rx))
    }

    /// Submits a task whose outcome nobody observes.
    ///
    /// A panic inside the task is logged and counted as a failure.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::Rejected` if the queue is full, or
    /// `TaskError::Shutdown` after [`TaskExecutor::shutdown`].
    pub fn execute<F>(&self, operation: F) -> Result<(), TaskError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let counters = Arc::clone(&self.counters);
        let executor = self.config.name.clone();

        let job = Box::pin(async move {
            let wrapped = async move {
                operation.await;
                Ok(())
            };
            if let Err(err) = run_guarded(wrapped, &counters, &executor).await {
                warn!(error = %err, "fire-and-forget task failed");
            }
        });

        self.enqueue(QueuedJob { task_id, job })
    }

    /// Returns a snapshot of pool activity.
    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            pool_size: self.config.pool_size,
            active: self.counters.active.load(Ordering::Relaxed),
            queued: self.counters.queued.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Returns `true` once [`TaskExecutor::shutdown`] has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Stops accepting tasks and waits for queued and running tasks.
    ///
    /// Workers still busy after `await_termination` are aborted; handles of
    /// the tasks they were running or had queued resolve to
    /// `TaskError::Interrupted`. Calling this more than once is a no-op.
    pub async fn shutdown(&self) {
        // Dropping the only sender closes the queue once it is drained.
        let Some(sender) = self.tx.lock().take() else {
            return;
        };
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock());
        let deadline = tokio::time::Instant::now() + self.config.await_termination;
        let mut aborted = 0usize;

        for mut worker in workers {
            if tokio::time::timeout_at(deadline, &mut worker).await.is_err() {
                worker.abort();
                // Wait for cancellation so the running task's guard settles
                // the counters.
                let _ = worker.await;
                aborted += 1;
            }
        }

        // With every worker gone the queue is dropped along with any task
        // still waiting in it.
        let stranded = self.counters.queued.swap(0, Ordering::Relaxed);
        if stranded > 0 {
            self.counters
                .failed
                .fetch_add(stranded as u64, Ordering::Relaxed);
        }

        if aborted == 0 {
            info!(executor = %self.config.name, "task executor drained");
        } else {
            warn!(
                executor = %self.config.name,
                aborted,
                "await termination expired, aborted busy workers"
            );
        }
    }

    fn enqueue(&self, job: QueuedJob) -> Result<(), TaskError> {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(self.shutdown_error());
        };

        let task_id = job.task_id;
        // Counted before sending so a fast worker never decrements first.
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        match tx.try_send(job) {
            Ok(()) => {
                metrics::counter!("executor_tasks_submitted_total", "executor" => self.config.name.clone())
                    .increment(1);
                debug!(executor = %self.config.name, task_id, "task queued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("executor_tasks_rejected_total", "executor" => self.config.name.clone())
                    .increment(1);
                warn!(executor = %self.config.name, task_id, "queue full, task rejected");
                Err(TaskError::Rejected {
                    executor: self.config.name.clone(),
                    queue_capacity: self.config.queue_capacity,
                })
            }
            Err(TrySendError::Closed(_)) => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                Err(self.shutdown_error())
            }
        }
    }

    fn shutdown_error(&self) -> TaskError {
        TaskError::Shutdown {
            executor: self.config.name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker loop
// ---------------------------------------------------------------------------

async fn worker_loop(
    executor: String,
    worker: String,
    rx: SharedReceiver,
    counters: Arc<Counters>,
) {
    debug!(executor = %executor, worker = %worker, "worker started");

    loop {
        // Only one idle worker waits on the queue at a time.
        let next = rx.lock().await.recv().await;
        let Some(QueuedJob { task_id, job }) = next else {
            break;
        };

        counters.queued.fetch_sub(1, Ordering::Relaxed);
        let mut running = RunningTask::start(&counters);

        let span = info_span!("task", executor = %executor, worker = %worker, task_id);
        job.instrument(span).await;

        running.finished = true;
    }

    debug!(executor = %executor, worker = %worker, "worker stopped");
}

/// Marks a task as active until dropped. A task dropped before finishing
/// (its worker was aborted) is counted as failed.
struct RunningTask<'a> {
    counters: &'a Counters,
    finished: bool,
}

impl<'a> RunningTask<'a> {
    fn start(counters: &'a Counters) -> Self {
        counters.active.fetch_add(1, Ordering::Relaxed);
        Self {
            counters,
            finished: false,
        }
    }
}

impl Drop for RunningTask<'_> {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::Relaxed);
        if !self.finished {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Runs an operation, converting errors and panics into `TaskError` and
/// recording its outcome.
async fn run_guarded<F, T>(operation: F, counters: &Counters, executor: &str) -> Result<T, TaskError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let start = Instant::now();

    let outcome = match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(TaskError::Failed {
            message: format!("{err:#}"),
        }),
        Err(payload) => Err(TaskError::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    };

    metrics::histogram!("executor_task_duration_seconds", "executor" => executor.to_string())
        .record(start.elapsed().as_secs_f64());

    if outcome.is_ok() {
        counters.completed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("executor_tasks_completed_total", "executor" => executor.to_string())
            .increment(1);
    } else {
        counters.failed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("executor_tasks_failed_total", "executor" => executor.to_string())
            .increment(1);
    }

    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use super::*;

    fn small_config(pool_size: usize, queue_capacity: usize) -> ExecutorConfig {
        ExecutorConfig {
            name: "test".to_string(),
            pool_size,
            queue_capacity,
            thread_name_prefix: "test-".to_string(),
            await_termination: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn submit_delivers_result() {
        let executor = TaskExecutor::start(small_config(2, 8)).unwrap();
        let handle = executor.submit(async { Ok(21 * 2) }).unwrap();
        assert_eq!(handle.await.unwrap(), 42);
        assert_eq!(executor.stats().completed, 1);
    }

    #[tokio::test]
    async fn task_ids_increase() {
        let executor = TaskExecutor::start(small_config(1, 8)).unwrap();
        let first = executor.submit(async { Ok(()) }).unwrap();
        let second = executor.submit(async { Ok(()) }).unwrap();
        assert!(second.task_id() > first.task_id());
    }

    #[tokio::test]
    async fn operation_error_resolves_to_failed() {
        let executor = TaskExecutor::start(small_config(1, 8)).unwrap();
        let handle = executor
            .submit(async { Err::<String, _>(anyhow::anyhow!("Simulated exception")) })
            .unwrap();

        let err = handle.await.unwrap_err();
        assert_eq!(
            err,
            TaskError::Failed {
                message: "Simulated exception".to_string()
            }
        );
        assert_eq!(executor.stats().failed, 1);
    }

    #[tokio::test]
    async fn panic_is_contained_and_worker_survives() {
        let executor = TaskExecutor::start(small_config(1, 8)).unwrap();

        let handle = executor
            .submit(async {
                if true {
                    panic!("worker blew up");
                }
                Ok(0u32)
            })
            .unwrap();
        let err = handle.await.unwrap_err();
        assert!(matches!(err, TaskError::Panicked { ref message } if message == "worker blew up"));

        // The single worker must still be serving.
        let handle = executor.submit(async { Ok(1u32) }).unwrap();
        assert_eq!(handle.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn execute_runs_without_a_handle() {
        let executor = TaskExecutor::start(small_config(1, 8)).unwrap();
        let ran = Arc::new(AtomicU32::new(0));
        let ran_in_task = Arc::clone(&ran);

        executor
            .execute(async move {
                ran_in_task.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        executor.shutdown().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(executor.stats().completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded_by_pool_size() {
        let executor = TaskExecutor::start(small_config(2, 8)).unwrap();
        let start = tokio::time::Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                executor
                    .submit(async move {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        Ok(i)
                    })
                    .unwrap()
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        // Four one-second tasks on two workers take two rounds.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_rejects_submission() {
        let executor = TaskExecutor::start(small_config(1, 1)).unwrap();

        let running = executor
            .submit(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .unwrap();
        // Let the worker take the first task off the queue.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(executor.stats().active, 1);

        let queued = executor.submit(async { Ok(()) }).unwrap();
        assert_eq!(executor.stats().queued, 1);

        let err = executor.submit(async { Ok(()) }).unwrap_err();
        assert!(matches!(err, TaskError::Rejected { queue_capacity: 1, .. }));
        assert_eq!(executor.stats().rejected, 1);

        running.await.unwrap();
        queued.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_drains_queued_tasks() {
        let executor = TaskExecutor::start(small_config(1, 8)).unwrap();
        let handles: Vec<_> = (0..3)
            .map(|i| executor.submit(async move { Ok(i) }).unwrap())
            .collect();

        executor.shutdown().await;
        assert!(executor.is_shutdown());

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        assert_eq!(results, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn submit_after_shutdown_returns_error() {
        let executor = TaskExecutor::start(small_config(1, 8)).unwrap();
        executor.shutdown().await;
        // Second call is a no-op.
        executor.shutdown().await;

        let err = executor.submit(async { Ok(()) }).unwrap_err();
        assert!(matches!(err, TaskError::Shutdown { .. }));
        assert!(executor.execute(async {}).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_timeout_interrupts_running_task() {
        let config = ExecutorConfig {
            await_termination: Duration::from_millis(100),
            ..small_config(1, 8)
        };
        let executor = TaskExecutor::start(config).unwrap();

        let handle = executor
            .submit(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        executor.shutdown().await;
        assert_eq!(handle.await.unwrap_err(), TaskError::Interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_shutdown_settles_stats() {
        let config = ExecutorConfig {
            await_termination: Duration::from_millis(100),
            ..small_config(1, 8)
        };
        let executor = TaskExecutor::start(config).unwrap();

        let running = executor
            .submit(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let waiting = executor.submit(async { Ok(()) }).unwrap();
        assert_eq!(executor.stats().queued, 1);

        executor.shutdown().await;

        assert_eq!(running.await.unwrap_err(), TaskError::Interrupted);
        assert_eq!(waiting.await.unwrap_err(), TaskError::Interrupted);

        let stats = executor.stats();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.failed, 2);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let result = TaskExecutor::start(small_config(0, 8));
        assert!(matches!(result, Err(TaskError::InvalidConfig(_))));
    }
}
