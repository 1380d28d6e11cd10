//! Channel-fed worker pool for stage execution.
//!
//! The dispatcher queues tasks over an mpsc channel; the worker consumes
//! them and runs the stage executor with bounded concurrency. Lifecycle
//! events go out over a broadcast channel for observability and tests.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::{error, info};
use uuid::Uuid;

use draftmill_core::{defaults, Error, Result, Stage};

use crate::executor::{ExecutionOutcome, StageExecutor, StageTask};

/// Configuration for the stage worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of stage executions running concurrently.
    pub max_concurrent: usize,
    /// Capacity of the dispatcher -> worker task channel.
    pub queue_capacity: usize,
    /// Whether to process tasks at all. A disabled worker fails queued
    /// jobs immediately instead of leaving them in `processing`.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::WORKER_MAX_CONCURRENT,
            queue_capacity: defaults::WORKER_QUEUE_CAPACITY,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_ENABLED` | `true` | Enable/disable stage execution |
    /// | `WORKER_MAX_CONCURRENT` | `4` | Max concurrent stage executions |
    /// | `WORKER_QUEUE_CAPACITY` | `64` | Task channel capacity |
    pub fn from_env() -> Self {
        let enabled = std::env::var("WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent = std::env::var("WORKER_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::WORKER_MAX_CONCURRENT)
            .max(1);

        let queue_capacity = std::env::var("WORKER_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::WORKER_QUEUE_CAPACITY)
            .max(1);

        Self {
            max_concurrent,
            queue_capacity,
            enabled,
        }
    }

    /// Set maximum concurrent executions.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Set the task channel capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Enable or disable stage execution.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the stage worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Execution of a job began.
    JobStarted { job_id: Uuid, stage: Stage },
    /// A job completed successfully.
    JobCompleted { job_id: Uuid, stage: Stage },
    /// A job failed.
    JobFailed {
        job_id: Uuid,
        stage: Stage,
        error: String,
    },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for feeding and controlling a running worker.
pub struct WorkerHandle {
    queue: mpsc::Sender<StageTask>,
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Sender side of the task channel, for the dispatcher.
    pub fn queue(&self) -> mpsc::Sender<StageTask> {
        self.queue.clone()
    }

    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Stage worker consuming dispatcher tasks.
pub struct StageWorker {
    executor: Arc<StageExecutor>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl StageWorker {
    /// Create a new stage worker around an executor.
    pub fn new(executor: Arc<StageExecutor>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            executor,
            config,
            event_tx,
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker and return a handle for feeding and control.
    pub fn start(self) -> WorkerHandle {
        let (task_tx, task_rx) = mpsc::channel(self.config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(task_rx, shutdown_rx).await;
        });

        WorkerHandle {
            queue: task_tx,
            shutdown_tx,
            event_rx,
        }
    }

    async fn run(
        self,
        mut task_rx: mpsc::Receiver<StageTask>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        if !self.config.enabled {
            info!("Stage worker is disabled; queued tasks will be failed");
            while let Some(task) = task_rx.recv().await {
                self.executor
                    .abort(&task, "stage worker is disabled")
                    .await;
            }
            return;
        }

        info!(
            max_concurrent = self.config.max_concurrent,
            queue_capacity = self.config.queue_capacity,
            "Stage worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Stage worker received shutdown signal");
                    break;
                }
                task = task_rx.recv() => {
                    let Some(task) = task else {
                        info!("Task channel closed; stage worker stopping");
                        break;
                    };

                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let executor = self.executor.clone();
                    let event_tx = self.event_tx.clone();

                    tokio::spawn(async move {
                        let _permit = permit;
                        let job_id = task.job_id;
                        let stage = task.stage;

                        let _ = event_tx.send(WorkerEvent::JobStarted { job_id, stage });
                        match executor.execute(task).await {
                            ExecutionOutcome::Completed => {
                                let _ = event_tx.send(WorkerEvent::JobCompleted { job_id, stage });
                            }
                            ExecutionOutcome::Failed(error) => {
                                let _ = event_tx.send(WorkerEvent::JobFailed {
                                    job_id,
                                    stage,
                                    error,
                                });
                            }
                        }
                    });
                }
            }
        }

        // Anything still queued at shutdown must not linger in `processing`.
        while let Ok(task) = task_rx.try_recv() {
            self.executor
                .abort(&task, "stage worker shut down before execution")
                .await;
        }

        if self.event_tx.send(WorkerEvent::WorkerStopped).is_err() {
            error!("No subscribers for worker stop event");
        }
        info!("Stage worker stopped");
    }
}
