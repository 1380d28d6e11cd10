//! HTTP handlers: trigger, status, document, health.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use draftmill_core::{Artifact, Error, JobSnapshot, JobState, Stage, TriggerPayload};
use draftmill_engine::{assemble, assemble_sections};

use crate::AppState;

/// Error wrapper mapping the core taxonomy onto HTTP statuses.
///
/// `PrerequisiteNotMet` and `InvalidPayload` are 400s returned
/// synchronously from the trigger — never silently queued. Executor-side
/// failures never pass through here; they surface in the job snapshot.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::SubjectNotFound(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::PrerequisiteNotMet { .. } | Error::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = json!({
            "error": self.0.code(),
            "message": self.0.to_string(),
        });
        // Carry the stage pair so clients can reconstruct the typed error.
        if let Error::PrerequisiteNotMet { stage, missing } = &self.0 {
            body["stage"] = json!(stage);
            body["missing"] = json!(missing);
        }

        (status, Json(body)).into_response()
    }
}

fn parse_stage(raw: &str) -> Result<Stage, ApiError> {
    Stage::parse(raw)
        .ok_or_else(|| ApiError(Error::NotFound(format!("unknown stage '{raw}'"))))
}

/// GET /health
pub async fn health() -> Json<JsonValue> {
    Json(json!({"status": "ok"}))
}

/// POST /subjects/{id}/stages/{stage}/trigger
pub async fn trigger_stage(
    State(state): State<AppState>,
    Path((subject_id, stage)): Path<(Uuid, String)>,
    Json(payload): Json<TriggerPayload>,
) -> Result<(StatusCode, Json<JobSnapshot>), ApiError> {
    let stage = parse_stage(&stage)?;
    let snapshot = state.dispatcher.trigger(subject_id, stage, payload).await?;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// GET /subjects/{id}/stages/{stage}/status
pub async fn stage_status(
    State(state): State<AppState>,
    Path((subject_id, stage)): Path<(Uuid, String)>,
) -> Result<Json<JobSnapshot>, ApiError> {
    let stage = parse_stage(&stage)?;
    let job = state
        .jobs
        .latest(subject_id, stage)
        .await?
        .ok_or_else(|| Error::NotFound(format!("no {stage} job for subject {subject_id}")))?;
    Ok(Json(job.snapshot()))
}

/// GET /subjects/{id}/stages/{stage}/document
///
/// Serves the assembled document for the latest completed run, building
/// and recording it on first read. The recorded artifact is keyed to the
/// selection that produced it: when the latest run used a different
/// selection, the stale artifact is cleared and rebuilt rather than
/// served.
pub async fn stage_document(
    State(state): State<AppState>,
    Path((subject_id, stage)): Path<(Uuid, String)>,
) -> Result<Json<JsonValue>, ApiError> {
    let stage = parse_stage(&stage)?;
    let job = state
        .jobs
        .latest(subject_id, stage)
        .await?
        .ok_or_else(|| Error::NotFound(format!("no {stage} job for subject {subject_id}")))?;

    if job.state != JobState::Completed {
        return Err(ApiError(Error::NotFound(format!(
            "no completed {stage} run for subject {subject_id}"
        ))));
    }

    let selection = job.payload.selected_ids.clone();
    if let Some(artifact) = state
        .artifacts
        .get_fresh(subject_id, stage, &selection)
        .await?
    {
        return Ok(Json(artifact.document));
    }

    let result = job
        .result
        .ok_or_else(|| Error::Internal("completed job without result".to_string()))?;
    let rich = if result.sections.is_empty() {
        assemble(&result.raw)
    } else {
        assemble_sections(&result.sections)
    };
    let document = serde_json::to_value(&rich).map_err(Error::from)?;

    state
        .artifacts
        .put(Artifact {
            subject_id,
            stage,
            document: document.clone(),
            selection,
            created_at: Utc::now(),
        })
        .await?;

    Ok(Json(document))
}
