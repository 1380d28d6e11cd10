//! In-memory store implementations.
//!
//! Always compiled so integration tests across the workspace (engine, api,
//! client) can run the full trigger → execute → poll flow without a
//! database. Also usable for embedded/demo deployments; the PostgreSQL
//! stores are the production implementations.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use draftmill_core::{
    selection_eq, Artifact, ArtifactStore, CreateTemplateRequest, Error, JobState, JobStore,
    NewJob, PromptTemplate, Result, Stage, StageJob, StageResult, SubjectStore, TemplateStore,
    TriggerOutcome,
};

// =============================================================================
// JOB STORE
// =============================================================================

/// In-memory implementation of [`JobStore`].
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<StageJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded jobs, all states. Test-support accessor.
    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn begin(&self, new: NewJob) -> Result<TriggerOutcome> {
        let mut jobs = self.jobs.lock().unwrap();

        if let Some(active) = jobs
            .iter()
            .find(|j| j.subject_id == new.subject_id && j.stage == new.stage && j.state.is_active())
        {
            return Ok(TriggerOutcome::AlreadyActive(active.clone()));
        }

        let now = Utc::now();
        let job = StageJob {
            id: Uuid::now_v7(),
            subject_id: new.subject_id,
            stage: new.stage,
            state: JobState::Processing,
            payload: new.payload,
            result: None,
            error: None,
            created_at: now,
            started_at: Some(now),
            completed_at: None,
        };
        jobs.push(job.clone());
        Ok(TriggerOutcome::Started(job))
    }

    async fn complete(&self, job_id: Uuid, result: StageResult) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| Error::NotFound(format!("job {job_id}")))?;
        if job.state.is_terminal() {
            return Ok(());
        }
        job.state = JobState::Completed;
        job.result = Some(result);
        job.error = None;
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| Error::NotFound(format!("job {job_id}")))?;
        if job.state.is_terminal() {
            return Ok(());
        }
        job.state = JobState::Failed;
        job.error = Some(error.to_string());
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<StageJob>> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn latest(&self, subject_id: Uuid, stage: Stage) -> Result<Option<StageJob>> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .iter()
            .filter(|j| j.subject_id == subject_id && j.stage == stage)
            .max_by_key(|j| j.created_at)
            .cloned())
    }

    async fn list_for_subject(&self, subject_id: Uuid) -> Result<Vec<StageJob>> {
        let jobs = self.jobs.lock().unwrap();
        let mut out: Vec<StageJob> = jobs
            .iter()
            .filter(|j| j.subject_id == subject_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

// =============================================================================
// TEMPLATE STORE
// =============================================================================

/// In-memory implementation of [`TemplateStore`].
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: Mutex<Vec<PromptTemplate>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn create(&self, req: CreateTemplateRequest) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        self.templates.lock().unwrap().push(PromptTemplate {
            id,
            workflow: req.workflow,
            stage: req.stage,
            category: req.category,
            system_instruction: req.system_instruction,
            user_template: req.user_template,
            format_instruction: req.format_instruction,
            active: req.active,
            activated_at: now,
            created_at: now,
        });
        Ok(id)
    }

    async fn activate(&self, id: Uuid) -> Result<()> {
        let mut templates = self.templates.lock().unwrap();
        let template = templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(format!("template {id}")))?;
        template.active = true;
        template.activated_at = Utc::now();
        Ok(())
    }

    async fn resolve(
        &self,
        workflow: &str,
        stage: Stage,
        category: &str,
    ) -> Result<Option<PromptTemplate>> {
        let templates = self.templates.lock().unwrap();
        Ok(templates
            .iter()
            .filter(|t| {
                t.active && t.workflow == workflow && t.stage == stage && t.category == category
            })
            .max_by_key(|t| t.activated_at)
            .cloned())
    }
}

// =============================================================================
// ARTIFACT STORE
// =============================================================================

/// In-memory implementation of [`ArtifactStore`].
#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<HashMap<(Uuid, Stage), Artifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, artifact: Artifact) -> Result<()> {
        self.artifacts
            .lock()
            .unwrap()
            .insert((artifact.subject_id, artifact.stage), artifact);
        Ok(())
    }

    async fn get_fresh(
        &self,
        subject_id: Uuid,
        stage: Stage,
        current_selection: &[String],
    ) -> Result<Option<Artifact>> {
        let mut artifacts = self.artifacts.lock().unwrap();
        let key = (subject_id, stage);
        match artifacts.get(&key) {
            Some(artifact) if selection_eq(&artifact.selection, current_selection) => {
                Ok(Some(artifact.clone()))
            }
            Some(_) => {
                artifacts.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn clear(&self, subject_id: Uuid, stage: Stage) -> Result<()> {
        self.artifacts.lock().unwrap().remove(&(subject_id, stage));
        Ok(())
    }
}

// =============================================================================
// SUBJECT STORE
// =============================================================================

/// In-memory implementation of [`SubjectStore`].
#[derive(Default)]
pub struct MemorySubjectStore {
    subjects: Mutex<HashMap<Uuid, String>>,
}

impl MemorySubjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubjectStore for MemorySubjectStore {
    async fn create(&self, title: &str) -> Result<Uuid> {
        let id = Uuid::now_v7();
        self.subjects.lock().unwrap().insert(id, title.to_string());
        Ok(id)
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.subjects.lock().unwrap().contains_key(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftmill_core::TriggerPayload;

    fn new_job(subject_id: Uuid, stage: Stage) -> NewJob {
        NewJob {
            subject_id,
            stage,
            payload: TriggerPayload::default(),
        }
    }

    #[tokio::test]
    async fn test_begin_rejects_second_active_job() {
        let store = MemoryJobStore::new();
        let subject = Uuid::now_v7();

        let first = store
            .begin(new_job(subject, Stage::SourceAnalysis))
            .await
            .unwrap();
        let first_id = first.job().id;
        assert!(matches!(first, TriggerOutcome::Started(_)));

        let second = store
            .begin(new_job(subject, Stage::SourceAnalysis))
            .await
            .unwrap();
        match second {
            TriggerOutcome::AlreadyActive(job) => assert_eq!(job.id, first_id),
            TriggerOutcome::Started(_) => panic!("duplicate active job created"),
        }
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_begin_allows_new_job_after_terminal() {
        let store = MemoryJobStore::new();
        let subject = Uuid::now_v7();

        let first = store
            .begin(new_job(subject, Stage::SourceAnalysis))
            .await
            .unwrap();
        store
            .complete(first.job().id, StageResult::default())
            .await
            .unwrap();

        let second = store
            .begin(new_job(subject, Stage::SourceAnalysis))
            .await
            .unwrap();
        assert!(matches!(second, TriggerOutcome::Started(_)));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_independent_stages_run_in_parallel() {
        let store = MemoryJobStore::new();
        let subject = Uuid::now_v7();

        let a = store
            .begin(new_job(subject, Stage::SourceAnalysis))
            .await
            .unwrap();
        let b = store
            .begin(new_job(subject, Stage::OutlineGeneration))
            .await
            .unwrap();
        assert!(matches!(a, TriggerOutcome::Started(_)));
        assert!(matches!(b, TriggerOutcome::Started(_)));
    }

    #[tokio::test]
    async fn test_terminal_state_never_mutated() {
        let store = MemoryJobStore::new();
        let subject = Uuid::now_v7();

        let job = store
            .begin(new_job(subject, Stage::SourceAnalysis))
            .await
            .unwrap();
        let id = job.job().id;
        store.fail(id, "boom").await.unwrap();
        store.complete(id, StageResult::default()).await.unwrap();

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_latest_returns_newest_row() {
        let store = MemoryJobStore::new();
        let subject = Uuid::now_v7();

        let first = store
            .begin(new_job(subject, Stage::SourceAnalysis))
            .await
            .unwrap();
        store.fail(first.job().id, "first attempt").await.unwrap();
        let second = store
            .begin(new_job(subject, Stage::SourceAnalysis))
            .await
            .unwrap();

        let latest = store
            .latest(subject, Stage::SourceAnalysis)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, second.job().id);
    }

    #[tokio::test]
    async fn test_template_resolution_most_recently_activated_wins() {
        let store = MemoryTemplateStore::new();
        let req = |system: &str| CreateTemplateRequest {
            workflow: "proposal".to_string(),
            stage: Stage::SourceAnalysis,
            category: "general".to_string(),
            system_instruction: system.to_string(),
            user_template: "{{document}}".to_string(),
            format_instruction: "Respond in markdown.".to_string(),
            active: true,
        };

        let older = store.create(req("v1")).await.unwrap();
        let _newer = store.create(req("v2")).await.unwrap();

        let resolved = store
            .resolve("proposal", Stage::SourceAnalysis, "general")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.system_instruction, "v2");

        // Re-activating the older template moves it ahead.
        store.activate(older).await.unwrap();
        let resolved = store
            .resolve("proposal", Stage::SourceAnalysis, "general")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.system_instruction, "v1");
    }

    #[tokio::test]
    async fn test_template_resolution_ignores_inactive_and_other_keys() {
        let store = MemoryTemplateStore::new();
        store
            .create(CreateTemplateRequest {
                workflow: "proposal".to_string(),
                stage: Stage::SourceAnalysis,
                category: "general".to_string(),
                system_instruction: "inactive".to_string(),
                user_template: String::new(),
                format_instruction: String::new(),
                active: false,
            })
            .await
            .unwrap();

        assert!(store
            .resolve("proposal", Stage::SourceAnalysis, "general")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .resolve("newsletter", Stage::SourceAnalysis, "general")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_artifact_freshness_and_invalidation() {
        let store = MemoryArtifactStore::new();
        let subject = Uuid::now_v7();
        let selection = vec!["Intro".to_string(), "Budget".to_string()];

        store
            .put(Artifact {
                subject_id: subject,
                stage: Stage::OutlineGeneration,
                document: serde_json::json!({"blocks": []}),
                selection: selection.clone(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        // Same selection, different order — still fresh.
        let reordered = vec!["Budget".to_string(), "Intro".to_string()];
        assert!(store
            .get_fresh(subject, Stage::OutlineGeneration, &reordered)
            .await
            .unwrap()
            .is_some());

        // Changed selection — cleared, and stays cleared.
        let changed = vec!["Intro".to_string()];
        assert!(store
            .get_fresh(subject, Stage::OutlineGeneration, &changed)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_fresh(subject, Stage::OutlineGeneration, &selection)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_subject_store_exists() {
        let store = MemorySubjectStore::new();
        let id = store.create("Research proposal").await.unwrap();
        assert!(store.exists(id).await.unwrap());
        assert!(!store.exists(Uuid::now_v7()).await.unwrap());
    }
}
