//! Job dispatch: precondition checks, the idempotent trigger write, and
//! the fire-and-forget handoff to the worker channel.
//!
//! The dispatcher never waits on execution. It returns to the caller as
//! soon as the `processing` row is written and the task is queued; the
//! shared job store is the only synchronization point with the executor
//! and the poller.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use draftmill_core::{
    Error, JobSnapshot, JobState, JobStore, NewJob, Result, Stage, SubjectStore, TriggerOutcome,
    TriggerPayload,
};

use crate::executor::StageTask;

/// Validates and records stage triggers, then hands execution off.
pub struct JobDispatcher {
    jobs: Arc<dyn JobStore>,
    subjects: Arc<dyn SubjectStore>,
    queue: mpsc::Sender<StageTask>,
}

impl JobDispatcher {
    /// Create a dispatcher feeding the given worker queue.
    pub fn new(
        jobs: Arc<dyn JobStore>,
        subjects: Arc<dyn SubjectStore>,
        queue: mpsc::Sender<StageTask>,
    ) -> Self {
        Self {
            jobs,
            subjects,
            queue,
        }
    }

    /// Trigger a stage for a subject.
    ///
    /// Preconditions are checked in order: subject existence, prerequisite
    /// completion, payload shape. A trigger while a job is already active
    /// for the key is idempotent and returns the existing job's snapshot
    /// without creating a duplicate.
    pub async fn trigger(
        &self,
        subject_id: Uuid,
        stage: Stage,
        payload: TriggerPayload,
    ) -> Result<JobSnapshot> {
        if !self.subjects.exists(subject_id).await? {
            return Err(Error::SubjectNotFound(subject_id));
        }

        for prereq in stage.prerequisites() {
            let completed = self
                .jobs
                .latest(subject_id, *prereq)
                .await?
                .map(|job| job.state == JobState::Completed)
                .unwrap_or(false);
            if !completed {
                return Err(Error::PrerequisiteNotMet {
                    stage,
                    missing: *prereq,
                });
            }
        }

        validate_payload(stage, &payload)?;

        let outcome = self
            .jobs
            .begin(NewJob {
                subject_id,
                stage,
                payload: payload.clone(),
            })
            .await?;

        let job = match outcome {
            TriggerOutcome::AlreadyActive(job) => {
                info!(
                    subject_id = %subject_id,
                    stage = %stage,
                    job_id = %job.id,
                    "Trigger is a no-op: stage already in flight"
                );
                return Ok(job.snapshot());
            }
            TriggerOutcome::Started(job) => job,
        };

        let task = StageTask {
            job_id: job.id,
            subject_id,
            stage,
            payload,
        };

        // Fire-and-forget: queue the task and return. A full queue is a
        // saturated worker; fail the job rather than leave it in
        // `processing` with nobody to run it.
        if let Err(e) = self.queue.try_send(task) {
            warn!(
                subject_id = %subject_id,
                stage = %stage,
                error = %e,
                "Worker queue rejected task"
            );
            self.jobs
                .fail(job.id, "worker queue is full; re-trigger later")
                .await?;
            return Err(Error::Internal("worker queue is full".to_string()));
        }

        info!(
            subject_id = %subject_id,
            stage = %stage,
            job_id = %job.id,
            "Stage triggered"
        );
        Ok(job.snapshot())
    }
}

/// Stage-specific payload shape rules.
fn validate_payload(stage: Stage, payload: &TriggerPayload) -> Result<()> {
    if payload.selected_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(Error::InvalidPayload(
            "selected ids must not be blank".to_string(),
        ));
    }
    if stage.requires_selection() && payload.selected_ids.is_empty() {
        return Err(Error::InvalidPayload(format!(
            "{} requires at least one selected section id",
            stage
        )));
    }
    Ok(())
}
