//! Job store implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use draftmill_core::{
    Error, JobState, JobStore, NewJob, Result, Stage, StageJob, StageResult, TriggerOutcome,
    TriggerPayload,
};

/// PostgreSQL implementation of [`JobStore`].
pub struct PgJobStore {
    pool: Pool<Postgres>,
}

impl PgJobStore {
    /// Create a new PgJobStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse a job row into a StageJob.
    fn parse_job_row(row: sqlx::postgres::PgRow) -> Result<StageJob> {
        let stage_str: String = row.get("stage");
        let stage = Stage::parse(&stage_str)
            .ok_or_else(|| Error::Internal(format!("unknown stage '{stage_str}' in job row")))?;

        let state_str: String = row.get("state");
        let state = JobState::parse(&state_str)
            .ok_or_else(|| Error::Internal(format!("unknown state '{state_str}' in job row")))?;

        let payload: JsonValue = row.get("payload");
        let payload: TriggerPayload =
            serde_json::from_value(payload).map_err(|e| Error::Serialization(e.to_string()))?;

        let result: Option<JsonValue> = row.get("result");
        let result: Option<StageResult> = match result {
            Some(v) => {
                Some(serde_json::from_value(v).map_err(|e| Error::Serialization(e.to_string()))?)
            }
            None => None,
        };

        Ok(StageJob {
            id: row.get("id"),
            subject_id: row.get("subject_id"),
            stage,
            state,
            payload,
            result,
            error: row.get("error"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        })
    }

    const JOB_COLUMNS: &'static str =
        "id, subject_id, stage, state, payload, result, error, created_at, started_at, completed_at";
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn begin(&self, new: NewJob) -> Result<TriggerOutcome> {
        let job_id = Uuid::now_v7();
        let now = Utc::now();
        let payload = serde_json::to_value(&new.payload)?;

        // Atomic check-and-insert using INSERT ... WHERE NOT EXISTS to keep
        // the at-most-one-active invariant under concurrent triggers for the
        // same (subject_id, stage) key.
        let query = format!(
            "INSERT INTO stage_job (id, subject_id, stage, state, payload, created_at, started_at)
             SELECT $1, $2, $3, 'processing', $4, $5, $5
             WHERE NOT EXISTS (
                 SELECT 1 FROM stage_job
                 WHERE subject_id = $2 AND stage = $3
                   AND state IN ('pending', 'processing')
             )
             RETURNING {}",
            Self::JOB_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(job_id)
            .bind(new.subject_id)
            .bind(new.stage.as_str())
            .bind(&payload)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        if let Some(row) = row {
            return Ok(TriggerOutcome::Started(Self::parse_job_row(row)?));
        }

        // Lost the insert: an active job exists — return it instead of
        // creating a duplicate.
        let query = format!(
            "SELECT {} FROM stage_job
             WHERE subject_id = $1 AND stage = $2
               AND state IN ('pending', 'processing')
             ORDER BY created_at DESC
             LIMIT 1",
            Self::JOB_COLUMNS
        );
        let existing = sqlx::query(&query)
            .bind(new.subject_id)
            .bind(new.stage.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        match existing {
            Some(row) => Ok(TriggerOutcome::AlreadyActive(Self::parse_job_row(row)?)),
            // The active job reached a terminal state between the two
            // queries; retrying would succeed, but surfacing the race is
            // more honest than looping here.
            None => Err(Error::Internal(
                "active job vanished during idempotent trigger check".to_string(),
            )),
        }
    }

    async fn complete(&self, job_id: Uuid, result: StageResult) -> Result<()> {
        let now = Utc::now();
        let result = serde_json::to_value(&result)?;

        sqlx::query(
            "UPDATE stage_job
             SET state = 'completed', completed_at = $1, result = $2, error = NULL
             WHERE id = $3 AND state IN ('pending', 'processing')",
        )
        .bind(now)
        .bind(&result)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now();

        sqlx::query(
            "UPDATE stage_job
             SET state = 'failed', completed_at = $1, error = $2
             WHERE id = $3 AND state IN ('pending', 'processing')",
        )
        .bind(now)
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<StageJob>> {
        let query = format!(
            "SELECT {} FROM stage_job WHERE id = $1",
            Self::JOB_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn latest(&self, subject_id: Uuid, stage: Stage) -> Result<Option<StageJob>> {
        let query = format!(
            "SELECT {} FROM stage_job
             WHERE subject_id = $1 AND stage = $2
             ORDER BY created_at DESC
             LIMIT 1",
            Self::JOB_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(subject_id)
            .bind(stage.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn list_for_subject(&self, subject_id: Uuid) -> Result<Vec<StageJob>> {
        let query = format!(
            "SELECT {} FROM stage_job
             WHERE subject_id = $1
             ORDER BY created_at DESC",
            Self::JOB_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(subject_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_job_row).collect()
    }
}
