//! Core data model for the draftmill workflow engine.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// STAGES
// =============================================================================

/// A named step in the fixed generation pipeline.
///
/// The variant order is the pipeline order. Prerequisites are hard-coded:
/// this is deliberately not a general DAG engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    SourceAnalysis,
    ReferenceAnalysis,
    ConceptAnalysis,
    OutlineGeneration,
    DraftFeedback,
    DocumentRefinement,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 6] = [
        Stage::SourceAnalysis,
        Stage::ReferenceAnalysis,
        Stage::ConceptAnalysis,
        Stage::OutlineGeneration,
        Stage::DraftFeedback,
        Stage::DocumentRefinement,
    ];

    /// Wire/database identifier for this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::SourceAnalysis => "source-analysis",
            Stage::ReferenceAnalysis => "reference-analysis",
            Stage::ConceptAnalysis => "concept-analysis",
            Stage::OutlineGeneration => "outline-generation",
            Stage::DraftFeedback => "draft-feedback",
            Stage::DocumentRefinement => "document-refinement",
        }
    }

    /// Parse a wire/database identifier. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Stage> {
        match s {
            "source-analysis" => Some(Stage::SourceAnalysis),
            "reference-analysis" => Some(Stage::ReferenceAnalysis),
            "concept-analysis" => Some(Stage::ConceptAnalysis),
            "outline-generation" => Some(Stage::OutlineGeneration),
            "draft-feedback" => Some(Stage::DraftFeedback),
            "document-refinement" => Some(Stage::DocumentRefinement),
            _ => None,
        }
    }

    /// Stages that must have a `completed` job for the same subject before
    /// this stage may be triggered.
    pub fn prerequisites(&self) -> &'static [Stage] {
        match self {
            Stage::SourceAnalysis => &[],
            Stage::ReferenceAnalysis => &[Stage::SourceAnalysis],
            Stage::ConceptAnalysis => &[Stage::SourceAnalysis, Stage::ReferenceAnalysis],
            Stage::OutlineGeneration => &[Stage::ConceptAnalysis],
            Stage::DraftFeedback => &[Stage::OutlineGeneration],
            Stage::DocumentRefinement => &[Stage::DraftFeedback],
        }
    }

    /// Whether the trigger payload must name at least one selected section.
    ///
    /// Stages with upstream prerequisites consume prior sections; the entry
    /// stage works from the uploaded source document instead.
    pub fn requires_selection(&self) -> bool {
        !self.prerequisites().is_empty()
    }

    /// Whether a completed job for this stage must contain at least one
    /// parsed section. Every stage feeds downstream selection except the
    /// terminal refinement stage, whose output is a finished document.
    pub fn requires_sections(&self) -> bool {
        !matches!(self, Stage::DocumentRefinement)
    }

    /// Maximum model response length, in tokens.
    pub fn max_response_tokens(&self) -> u32 {
        match self {
            Stage::SourceAnalysis => 1536,
            Stage::ReferenceAnalysis => 1536,
            Stage::ConceptAnalysis => 1024,
            Stage::OutlineGeneration => 2048,
            Stage::DraftFeedback => 1024,
            Stage::DocumentRefinement => 4096,
        }
    }

    /// Whether generation for this stage uses deterministic sampling.
    /// Analysis stages are deterministic so re-runs over the same inputs
    /// are comparable; generation stages sample freely.
    pub fn deterministic(&self) -> bool {
        match self {
            Stage::SourceAnalysis
            | Stage::ReferenceAnalysis
            | Stage::ConceptAnalysis
            | Stage::DraftFeedback => true,
            Stage::OutlineGeneration | Stage::DocumentRefinement => false,
        }
    }

    /// Client-side poll ceiling for this stage, in seconds.
    pub fn poll_ceiling_secs(&self) -> u64 {
        match self {
            Stage::SourceAnalysis => 360,
            Stage::ReferenceAnalysis => 360,
            Stage::ConceptAnalysis => 300,
            Stage::OutlineGeneration => 600,
            Stage::DraftFeedback => 300,
            Stage::DocumentRefinement => 600,
        }
    }

    /// Context key for this stage's filtered sections (snake_case).
    pub fn context_key(&self) -> String {
        self.as_str().replace('-', "_")
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// JOB LIFECYCLE
// =============================================================================

/// Lifecycle state of a stage job.
///
/// `Pending` means "recorded but not yet picked up by the worker". The
/// dispatcher hands off to the worker channel in the same call that writes
/// the row, so jobs are born `Processing`; `Pending` is understood by the
/// stores and the at-most-one-active guard but never emitted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    /// Wire/database identifier for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Parse a wire/database identifier. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<JobState> {
        match s {
            "pending" => Some(JobState::Pending),
            "processing" => Some(JobState::Processing),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            _ => None,
        }
    }

    /// Whether this state is terminal. Terminal rows are never mutated;
    /// a new trigger supersedes them with a fresh job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Whether a job in this state counts toward the at-most-one-active
    /// invariant for its (subject, stage) key.
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Pending | JobState::Processing)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SECTIONS & RESULTS
// =============================================================================

/// A titled chunk of a stage's generated text, extracted by heading
/// detection. Titles are the join key for downstream selection filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub body: String,
}

impl Section {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Parsed result of a completed stage. `sections` preserves order of
/// appearance in `raw`; `raw` always carries the full model response even
/// when zero sections were extracted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageResult {
    pub raw: String,
    pub sections: Vec<Section>,
}

impl StageResult {
    /// Look up a section body by exact title.
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }

    /// Titles in order of appearance.
    pub fn titles(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.title.as_str()).collect()
    }
}

// =============================================================================
// TRIGGER PAYLOAD
// =============================================================================

/// Caller-supplied input for one stage trigger.
///
/// `extra` captures stage-specific fields without a schema change; values
/// are serialized to stable text before placeholder injection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerPayload {
    /// Section titles the user selected from upstream results.
    #[serde(default)]
    pub selected_ids: Vec<String>,
    /// Free-text annotations keyed by the same selection identifiers.
    #[serde(default)]
    pub user_comments: HashMap<String, String>,
    /// Stage-specific fields, passed through to the context builder.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

impl TriggerPayload {
    pub fn with_selection<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected_ids: ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

// =============================================================================
// JOBS
// =============================================================================

/// One tracked asynchronous execution of a single stage for one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageJob {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub stage: Stage,
    pub state: JobState,
    pub payload: TriggerPayload,
    pub result: Option<StageResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageJob {
    /// The wire-facing snapshot returned by trigger and status endpoints.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            subject_id: self.subject_id,
            stage: self.stage,
            state: self.state,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error.clone(),
            result: self.result.clone(),
        }
    }
}

/// Request to record a new job at trigger time.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub subject_id: Uuid,
    pub stage: Stage,
    pub payload: TriggerPayload,
}

/// Snapshot of a job as observed by the poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub stage: Stage,
    pub state: JobState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<StageResult>,
}

// =============================================================================
// TEMPLATES
// =============================================================================

/// An authored prompt template triple, tagged with the (workflow, stage,
/// category) it applies to. Multiple templates may match a stage; the most
/// recently activated one wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: Uuid,
    pub workflow: String,
    pub stage: Stage,
    pub category: String,
    pub system_instruction: String,
    pub user_template: String,
    pub format_instruction: String,
    pub active: bool,
    pub activated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// ARTIFACTS
// =============================================================================

/// A downstream document assembled from a completed stage's sections,
/// together with the selection it was derived from. When the recorded
/// selection no longer matches the current one (as a set), the artifact is
/// stale and must be cleared rather than served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub subject_id: Uuid,
    pub stage: Stage,
    pub document: JsonValue,
    pub selection: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Set-equality over selection lists; order and duplicates are irrelevant.
pub fn selection_eq(a: &[String], b: &[String]) -> bool {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a == b
}
