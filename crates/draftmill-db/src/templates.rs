//! Template store implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use draftmill_core::{
    CreateTemplateRequest, Error, PromptTemplate, Result, Stage, TemplateStore,
};

/// PostgreSQL implementation of [`TemplateStore`].
pub struct PgTemplateStore {
    pool: Pool<Postgres>,
}

impl PgTemplateStore {
    /// Create a new PgTemplateStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_template_row(row: sqlx::postgres::PgRow) -> Result<PromptTemplate> {
        let stage_str: String = row.get("stage");
        let stage = Stage::parse(&stage_str).ok_or_else(|| {
            Error::Internal(format!("unknown stage '{stage_str}' in template row"))
        })?;

        Ok(PromptTemplate {
            id: row.get("id"),
            workflow: row.get("workflow"),
            stage,
            category: row.get("category"),
            system_instruction: row.get("system_instruction"),
            user_template: row.get("user_template"),
            format_instruction: row.get("format_instruction"),
            active: row.get("active"),
            activated_at: row.get("activated_at"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl TemplateStore for PgTemplateStore {
    async fn create(&self, req: CreateTemplateRequest) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO prompt_template
                (id, workflow, stage, category, system_instruction, user_template,
                 format_instruction, active, activated_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            "#,
        )
        .bind(id)
        .bind(&req.workflow)
        .bind(req.stage.as_str())
        .bind(&req.category)
        .bind(&req.system_instruction)
        .bind(&req.user_template)
        .bind(&req.format_instruction)
        .bind(req.active)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn activate(&self, id: Uuid) -> Result<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE prompt_template SET active = TRUE, activated_at = $1 WHERE id = $2",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("template {id}")));
        }
        Ok(())
    }

    async fn resolve(
        &self,
        workflow: &str,
        stage: Stage,
        category: &str,
    ) -> Result<Option<PromptTemplate>> {
        // Most recently activated match wins — a documented tie-break, not
        // an error, since authors iterate on templates in place.
        let row = sqlx::query(
            r#"
            SELECT id, workflow, stage, category, system_instruction, user_template,
                   format_instruction, active, activated_at, created_at
            FROM prompt_template
            WHERE workflow = $1 AND stage = $2 AND category = $3 AND active
            ORDER BY activated_at DESC
            LIMIT 1
            "#,
        )
        .bind(workflow)
        .bind(stage.as_str())
        .bind(category)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_template_row).transpose()
    }
}
