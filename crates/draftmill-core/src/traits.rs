//! Core traits for draftmill abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability. PostgreSQL
//! implementations live in `draftmill-db`; in-memory implementations for
//! tests and embedded use live alongside them.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// JOB STORE
// =============================================================================

/// Outcome of an idempotent trigger write.
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    /// A fresh `processing` job was recorded.
    Started(StageJob),
    /// An active job already exists for the key; no duplicate was created.
    AlreadyActive(StageJob),
}

impl TriggerOutcome {
    /// The job backing this outcome, fresh or pre-existing.
    pub fn job(&self) -> &StageJob {
        match self {
            TriggerOutcome::Started(job) | TriggerOutcome::AlreadyActive(job) => job,
        }
    }
}

/// Durable record of asynchronous stage executions.
///
/// The store is the single synchronization point between the dispatcher
/// (one insert per trigger), the executor (one terminal write per job) and
/// the poller (reads). Terminal rows are never mutated; a later trigger
/// for the same key supersedes them with a new row.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically record a `processing` job unless one is already active
    /// for (`subject_id`, `stage`). Enforces the at-most-one-active
    /// invariant at trigger time.
    async fn begin(&self, new: NewJob) -> Result<TriggerOutcome>;

    /// Write the terminal `completed` state with the parsed result.
    async fn complete(&self, job_id: Uuid, result: StageResult) -> Result<()>;

    /// Write the terminal `failed` state with a human-readable error.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// Fetch a job by id.
    async fn get(&self, job_id: Uuid) -> Result<Option<StageJob>>;

    /// Fetch the most recent job for (`subject_id`, `stage`), any state.
    async fn latest(&self, subject_id: Uuid, stage: Stage) -> Result<Option<StageJob>>;

    /// All jobs for a subject, most recent first.
    async fn list_for_subject(&self, subject_id: Uuid) -> Result<Vec<StageJob>>;
}

// =============================================================================
// TEMPLATE STORE
// =============================================================================

/// Request for authoring a new prompt template.
#[derive(Debug, Clone)]
pub struct CreateTemplateRequest {
    pub workflow: String,
    pub stage: Stage,
    pub category: String,
    pub system_instruction: String,
    pub user_template: String,
    pub format_instruction: String,
    pub active: bool,
}

/// Read-mostly store of authored prompt templates.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Author a new template.
    async fn create(&self, req: CreateTemplateRequest) -> Result<Uuid>;

    /// Mark a template active, stamping its activation time. The most
    /// recently activated match wins at resolution.
    async fn activate(&self, id: Uuid) -> Result<()>;

    /// Resolve the winning active template for (workflow, stage, category),
    /// or `None` when nothing matches.
    async fn resolve(
        &self,
        workflow: &str,
        stage: Stage,
        category: &str,
    ) -> Result<Option<PromptTemplate>>;
}

// =============================================================================
// ARTIFACT STORE
// =============================================================================

/// Store of assembled downstream documents with selection-based staleness.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Record (or replace) the artifact for (`subject_id`, `stage`).
    async fn put(&self, artifact: Artifact) -> Result<()>;

    /// Fetch the artifact for the key if its recorded selection still
    /// matches `current_selection` as a set. A stale artifact is cleared
    /// and `None` is returned rather than serving outdated content.
    async fn get_fresh(
        &self,
        subject_id: Uuid,
        stage: Stage,
        current_selection: &[String],
    ) -> Result<Option<Artifact>>;

    /// Explicitly drop the artifact for the key.
    async fn clear(&self, subject_id: Uuid, stage: Stage) -> Result<()>;
}

// =============================================================================
// SUBJECT STORE
// =============================================================================

/// Narrow view of the persisted-entity store: the engine only needs to
/// know whether the parent document exists. Full subject CRUD is an
/// external collaborator.
#[async_trait]
pub trait SubjectStore: Send + Sync {
    /// Register a subject, returning its id.
    async fn create(&self, title: &str) -> Result<Uuid>;

    /// Whether a subject exists.
    async fn exists(&self, id: Uuid) -> Result<bool>;
}

// =============================================================================
// GENERATION BACKEND
// =============================================================================

/// Per-call generation settings, configured per stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    /// Maximum response length in tokens.
    pub max_tokens: u32,
    /// Deterministic sampling (temperature 0, fixed seed) when true.
    pub deterministic: bool,
}

impl GenerationOptions {
    /// Stage-configured options.
    pub fn for_stage(stage: Stage) -> Self {
        Self {
            max_tokens: stage.max_response_tokens(),
            deterministic: stage.deterministic(),
        }
    }
}

/// Narrow interface to the hosted model: prompt in, text out. Transport,
/// quota, and HTTP failures surface as a single opaque error variant.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text from a system instruction and a user prompt.
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String>;

    /// The model name being used.
    fn model_name(&self) -> &str;
}
