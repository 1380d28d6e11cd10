//! Bounded fixed-interval status polling.
//!
//! The poller repeatedly reads the job snapshot for one (subject, stage)
//! key until it observes a terminal state or its attempt budget runs out.
//! Giving up never mutates server state: the job stays eligible to
//! complete later, and a fresh `wait` call re-attaches to the same key and
//! resumes observation without re-triggering.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use draftmill_core::{defaults, Error, JobSnapshot, JobState, Result, Stage};

/// Anything that can produce a job snapshot for a key: the HTTP status
/// client in production, a job store adapter in tests.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the current snapshot, or `None` when the key has never been
    /// triggered (or is not visible yet).
    async fn fetch(&self, subject_id: Uuid, stage: Stage) -> Result<Option<JobSnapshot>>;
}

#[async_trait]
impl<S: SnapshotSource + ?Sized> SnapshotSource for std::sync::Arc<S> {
    async fn fetch(&self, subject_id: Uuid, stage: Stage) -> Result<Option<JobSnapshot>> {
        (**self).fetch(subject_id, stage).await
    }
}

/// Polling schedule for one wait.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Fixed interval between polls.
    pub interval: Duration,
    /// Attempt budget; exhausting it surfaces a client-side `Timeout`.
    pub max_attempts: u32,
    /// A `processing` job older than this is treated as an implicit
    /// failure even if the store was never updated.
    pub stale_after: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        let interval = Duration::from_secs(defaults::POLL_INTERVAL_SECS);
        Self {
            interval,
            // Enough attempts to cover the largest per-stage ceiling.
            max_attempts: 200,
            stale_after: Duration::from_secs(defaults::STALE_PROCESSING_SECS),
        }
    }
}

impl PollConfig {
    /// Schedule sized to a stage's documented ceiling (3–10 minutes
    /// depending on the stage).
    pub fn for_stage(stage: Stage) -> Self {
        let interval_secs = defaults::POLL_INTERVAL_SECS;
        Self {
            interval: Duration::from_secs(interval_secs),
            max_attempts: stage.poll_ceiling_secs().div_ceil(interval_secs) as u32,
            ..Default::default()
        }
    }

    /// Set the poll interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the stale-processing threshold.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }
}

/// How a wait ended. `Timeout` is an error, not an outcome: the UI shows
/// "keep waiting / check later" for it, versus a retry affordance for
/// `Failed` and `StaleProcessing`.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Terminal success with the parsed result.
    Completed(JobSnapshot),
    /// Terminal failure recorded by the executor.
    Failed(JobSnapshot),
    /// Still `processing` past the maximum processing age; implicitly
    /// failed from the client's perspective. Server state is untouched.
    StaleProcessing(JobSnapshot),
}

/// The client-side observation loop.
pub struct Poller<S: SnapshotSource> {
    source: S,
    config: PollConfig,
}

impl<S: SnapshotSource> Poller<S> {
    /// Create a poller over a snapshot source.
    pub fn new(source: S, config: PollConfig) -> Self {
        Self { source, config }
    }

    /// Single snapshot read, no looping.
    pub async fn poll_once(&self, subject_id: Uuid, stage: Stage) -> Result<Option<JobSnapshot>> {
        self.source.fetch(subject_id, stage).await
    }

    /// Observe the key until a terminal state or the attempt budget runs
    /// out (→ `Error::Timeout`). Safe to call again after a timeout or a
    /// restart: it re-attaches to the same key rather than re-triggering.
    pub async fn wait(&self, subject_id: Uuid, stage: Stage) -> Result<PollOutcome> {
        for attempt in 1..=self.config.max_attempts {
            if let Some(snapshot) = self.source.fetch(subject_id, stage).await? {
                match snapshot.state {
                    JobState::Completed => return Ok(PollOutcome::Completed(snapshot)),
                    JobState::Failed => return Ok(PollOutcome::Failed(snapshot)),
                    JobState::Pending | JobState::Processing => {
                        if let Some(started_at) = snapshot.started_at {
                            let age = (Utc::now() - started_at)
                                .to_std()
                                .unwrap_or(Duration::ZERO);
                            if age > self.config.stale_after {
                                warn!(
                                    subject_id = %subject_id,
                                    stage = %stage,
                                    age_secs = age.as_secs(),
                                    "Job exceeded maximum processing age"
                                );
                                return Ok(PollOutcome::StaleProcessing(snapshot));
                            }
                        }
                        debug!(
                            subject_id = %subject_id,
                            stage = %stage,
                            attempt,
                            "Job still in flight"
                        );
                    }
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.config.interval).await;
            }
        }

        Err(Error::Timeout(format!(
            "{} did not reach a terminal state within {} attempts",
            stage, self.config.max_attempts
        )))
    }
}
