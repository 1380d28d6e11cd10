//! Error types for the draftmill workflow engine.

use thiserror::Error;

use crate::models::Stage;

/// Result type alias using draftmill's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for draftmill operations.
///
/// Dispatcher-facing variants (`SubjectNotFound`, `PrerequisiteNotMet`,
/// `InvalidPayload`) are returned synchronously to the trigger caller.
/// Executor-facing variants (`TemplateNotFound`, `Inference`, `Parse`)
/// are recorded on the job row as its terminal `failed` error and never
/// propagate back to the caller, who has already disconnected.
/// `Timeout` exists for the client-side poller only and never mutates
/// server state.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Subject not found
    #[error("Subject not found: {0}")]
    SubjectNotFound(uuid::Uuid),

    /// A prerequisite stage has no completed job for this subject
    #[error("Prerequisite not met for {stage}: {missing} has not completed")]
    PrerequisiteNotMet { stage: Stage, missing: Stage },

    /// Trigger payload violates the stage's shape rules
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// No active prompt template matches (workflow, stage, category)
    #[error("Template not found for workflow '{workflow}', stage {stage}, category '{category}'")]
    TemplateNotFound {
        workflow: String,
        stage: Stage,
        category: String,
    },

    /// Inference/generation failed (transport, quota, or timeout)
    #[error("Inference error: {0}")]
    Inference(String),

    /// Response parsing failed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Client-observed poll timeout; server-side job state is untouched
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl Error {
    /// Stable machine-readable code for the HTTP error body.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Database(_) => "database",
            Error::NotFound(_) => "not_found",
            Error::SubjectNotFound(_) => "not_found",
            Error::PrerequisiteNotMet { .. } => "prerequisite_not_met",
            Error::InvalidPayload(_) => "invalid_payload",
            Error::TemplateNotFound { .. } => "template_not_found",
            Error::Inference(_) => "inference_failure",
            Error::Parse(_) => "parse_failure",
            Error::Timeout(_) => "timeout",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
            Error::Request(_) => "request",
            Error::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_subject_not_found() {
        let id = Uuid::nil();
        let err = Error::SubjectNotFound(id);
        assert_eq!(err.to_string(), format!("Subject not found: {}", id));
    }

    #[test]
    fn test_error_display_prerequisite_not_met() {
        let err = Error::PrerequisiteNotMet {
            stage: Stage::ConceptAnalysis,
            missing: Stage::SourceAnalysis,
        };
        assert_eq!(
            err.to_string(),
            "Prerequisite not met for concept-analysis: source-analysis has not completed"
        );
    }

    #[test]
    fn test_error_display_template_not_found() {
        let err = Error::TemplateNotFound {
            workflow: "proposal".to_string(),
            stage: Stage::SourceAnalysis,
            category: "general".to_string(),
        };
        assert!(err.to_string().contains("proposal"));
        assert!(err.to_string().contains("source-analysis"));
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("model timeout".to_string());
        assert_eq!(err.to_string(), "Inference error: model timeout");
    }

    #[test]
    fn test_error_code_mapping() {
        let err = Error::PrerequisiteNotMet {
            stage: Stage::ReferenceAnalysis,
            missing: Stage::SourceAnalysis,
        };
        assert_eq!(err.code(), "prerequisite_not_met");
        assert_eq!(Error::InvalidPayload("x".into()).code(), "invalid_payload");
        assert_eq!(Error::Timeout("x".into()).code(), "timeout");
        assert_eq!(Error::SubjectNotFound(Uuid::nil()).code(), "not_found");
    }

    #[test]
    fn test_timeout_distinguishable_from_inference() {
        // The UI chooses "keep waiting" vs "re-trigger" based on this split.
        assert_ne!(
            Error::Timeout("poll budget exhausted".into()).code(),
            Error::Inference("gone".into()).code()
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
