//! Subject store implementation.
//!
//! The engine only needs existence checks against the parent document
//! entity; the full CRUD surface lives with the external entity store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use draftmill_core::{Error, Result, SubjectStore};

/// PostgreSQL implementation of [`SubjectStore`].
pub struct PgSubjectStore {
    pool: Pool<Postgres>,
}

impl PgSubjectStore {
    /// Create a new PgSubjectStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubjectStore for PgSubjectStore {
    async fn create(&self, title: &str) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        sqlx::query("INSERT INTO subject (id, title, created_at) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(title)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(id)
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM subject WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(found.is_some())
    }
}
