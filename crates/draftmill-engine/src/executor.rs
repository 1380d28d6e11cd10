//! Stage execution: the five-step pipeline behind every job.
//!
//! Runs detached from the trigger request. Each step's failure is fatal to
//! the job — there is no partial credit — and lands in the job row as its
//! terminal `failed` error. The executor is the only writer of terminal
//! states.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use draftmill_core::{
    defaults, Error, GenerationBackend, GenerationOptions, JobState, JobStore, Result, Stage,
    StageResult, TemplateStore, TriggerPayload,
};

use crate::context::build_context;
use crate::inject::inject_placeholders;
use crate::parse::parse_sections;

/// The unit of work handed from dispatcher to worker.
#[derive(Debug, Clone)]
pub struct StageTask {
    pub job_id: Uuid,
    pub subject_id: Uuid,
    pub stage: Stage,
    pub payload: TriggerPayload,
}

/// Terminal outcome of one execution, mirroring what was written to the
/// job store.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Completed,
    Failed(String),
}

/// Executes one stage pipeline per task and writes the terminal state.
pub struct StageExecutor {
    jobs: Arc<dyn JobStore>,
    templates: Arc<dyn TemplateStore>,
    backend: Arc<dyn GenerationBackend>,
    workflow: String,
    category: String,
    gen_timeout: Duration,
}

impl StageExecutor {
    /// Create an executor with the default workflow, category, and
    /// generation timeout.
    pub fn new(
        jobs: Arc<dyn JobStore>,
        templates: Arc<dyn TemplateStore>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            jobs,
            templates,
            backend,
            workflow: defaults::WORKFLOW.to_string(),
            category: defaults::CATEGORY.to_string(),
            gen_timeout: Duration::from_secs(defaults::GEN_TIMEOUT_SECS),
        }
    }

    /// Resolve templates under a different workflow name.
    pub fn with_workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = workflow.into();
        self
    }

    /// Resolve templates under a different category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Override the generation timeout. Must stay shorter than the poller
    /// ceiling so a hung model call surfaces as `failed`, not as a job
    /// stuck in `processing`.
    pub fn with_gen_timeout(mut self, timeout: Duration) -> Self {
        self.gen_timeout = timeout;
        self
    }

    /// Run the pipeline for one task and write the terminal state.
    pub async fn execute(&self, task: StageTask) -> ExecutionOutcome {
        let start = Instant::now();
        info!(
            job_id = %task.job_id,
            subject_id = %task.subject_id,
            stage = %task.stage,
            "Executing stage"
        );

        match self.run_pipeline(&task).await {
            Ok(result) => {
                let section_count = result.sections.len();
                if let Err(e) = self.jobs.complete(task.job_id, result).await {
                    warn!(error = %e, job_id = %task.job_id, "Failed to record completion");
                    return ExecutionOutcome::Failed(e.to_string());
                }
                info!(
                    job_id = %task.job_id,
                    stage = %task.stage,
                    section_count,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Stage completed"
                );
                ExecutionOutcome::Completed
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(write_err) = self.jobs.fail(task.job_id, &message).await {
                    warn!(error = %write_err, job_id = %task.job_id, "Failed to record failure");
                }
                warn!(
                    job_id = %task.job_id,
                    stage = %task.stage,
                    error = %message,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Stage failed"
                );
                ExecutionOutcome::Failed(message)
            }
        }
    }

    /// Mark a task failed without running it. Used when the worker cannot
    /// accept work (disabled, shutting down) so the job never sits in
    /// `processing` forever.
    pub async fn abort(&self, task: &StageTask, reason: &str) {
        if let Err(e) = self.jobs.fail(task.job_id, reason).await {
            warn!(error = %e, job_id = %task.job_id, "Failed to record aborted job");
        }
    }

    async fn run_pipeline(&self, task: &StageTask) -> Result<StageResult> {
        // 1. Resolve the template; missing is fatal.
        let template = self
            .templates
            .resolve(&self.workflow, task.stage, &self.category)
            .await?
            .ok_or_else(|| Error::TemplateNotFound {
                workflow: self.workflow.clone(),
                stage: task.stage,
                category: self.category.clone(),
            })?;

        // 2. Build the context from prior completed stages.
        let prior = self.prior_results(task).await?;
        let context = build_context(&prior, &task.payload);
        debug!(
            job_id = %task.job_id,
            context_keys = context.len(),
            "Context assembled"
        );

        // 3. Inject placeholders into both instruction bodies.
        let user_instruction = inject_placeholders(&template.user_template, &context);
        let format_instruction = inject_placeholders(&template.format_instruction, &context);
        let prompt = if format_instruction.is_empty() {
            user_instruction
        } else {
            format!("{}\n\n{}", user_instruction, format_instruction)
        };

        // 4. Invoke inference under the stage's limits, bounded by an
        // explicit timeout shorter than the poller ceiling.
        let options = GenerationOptions::for_stage(task.stage);
        debug!(
            job_id = %task.job_id,
            prompt_len = prompt.len(),
            max_tokens = options.max_tokens,
            "Invoking generation backend"
        );
        let raw = tokio::time::timeout(
            self.gen_timeout,
            self.backend
                .generate(&template.system_instruction, &prompt, &options),
        )
        .await
        .map_err(|_| {
            Error::Inference(format!(
                "generation timed out after {}s",
                self.gen_timeout.as_secs()
            ))
        })??;

        // 5. Parse the response into addressable sections.
        if raw.trim().is_empty() {
            return Err(Error::Parse("model returned an empty response".to_string()));
        }
        let sections = parse_sections(&raw);
        if sections.is_empty() && task.stage.requires_sections() {
            return Err(Error::Parse(format!(
                "no sections found in response for {}",
                task.stage
            )));
        }

        Ok(StageResult { raw, sections })
    }

    /// Results of every completed stage preceding this one in pipeline
    /// order, keyed by stage.
    async fn prior_results(&self, task: &StageTask) -> Result<BTreeMap<Stage, StageResult>> {
        let mut prior = BTreeMap::new();
        for stage in Stage::ALL.into_iter().filter(|s| *s < task.stage) {
            if let Some(job) = self.jobs.latest(task.subject_id, stage).await? {
                if job.state == JobState::Completed {
                    if let Some(result) = job.result {
                        prior.insert(stage, result);
                    }
                }
            }
        }
        Ok(prior)
    }
}
