//! Artifact store implementation.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use draftmill_core::{selection_eq, Artifact, ArtifactStore, Error, Result, Stage};

/// PostgreSQL implementation of [`ArtifactStore`].
///
/// One artifact per (`subject_id`, `stage`); a put replaces any prior row.
pub struct PgArtifactStore {
    pool: Pool<Postgres>,
}

impl PgArtifactStore {
    /// Create a new PgArtifactStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_artifact_row(row: sqlx::postgres::PgRow) -> Result<Artifact> {
        let stage_str: String = row.get("stage");
        let stage = Stage::parse(&stage_str).ok_or_else(|| {
            Error::Internal(format!("unknown stage '{stage_str}' in artifact row"))
        })?;

        Ok(Artifact {
            subject_id: row.get("subject_id"),
            stage,
            document: row.get::<JsonValue, _>("document"),
            selection: row.get::<Vec<String>, _>("selection"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl ArtifactStore for PgArtifactStore {
    async fn put(&self, artifact: Artifact) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stage_artifact (subject_id, stage, document, selection, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (subject_id, stage)
            DO UPDATE SET document = $3, selection = $4, created_at = $5
            "#,
        )
        .bind(artifact.subject_id)
        .bind(artifact.stage.as_str())
        .bind(&artifact.document)
        .bind(&artifact.selection)
        .bind(artifact.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get_fresh(
        &self,
        subject_id: Uuid,
        stage: Stage,
        current_selection: &[String],
    ) -> Result<Option<Artifact>> {
        let row = sqlx::query(
            "SELECT subject_id, stage, document, selection, created_at
             FROM stage_artifact
             WHERE subject_id = $1 AND stage = $2",
        )
        .bind(subject_id)
        .bind(stage.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let artifact = match row {
            Some(row) => Self::parse_artifact_row(row)?,
            None => return Ok(None),
        };

        if selection_eq(&artifact.selection, current_selection) {
            return Ok(Some(artifact));
        }

        // Upstream selection changed — the artifact is stale. Clear it
        // instead of serving outdated content.
        debug!(
            subject_id = %subject_id,
            stage = %stage,
            "Clearing stale artifact after selection change"
        );
        self.clear(subject_id, stage).await?;
        Ok(None)
    }

    async fn clear(&self, subject_id: Uuid, stage: Stage) -> Result<()> {
        sqlx::query("DELETE FROM stage_artifact WHERE subject_id = $1 AND stage = $2")
            .bind(subject_id)
            .bind(stage.as_str())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
