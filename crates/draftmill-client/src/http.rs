//! HTTP client for the trigger and status endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use draftmill_core::{Error, JobSnapshot, Result, Stage, TriggerPayload};

use crate::poller::SnapshotSource;

/// Default per-request timeout. Status reads are cheap; the long waits
/// belong to the poller, not the transport.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Error body returned by the server on 4xx/5xx.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
    stage: Option<Stage>,
    missing: Option<Stage>,
}

/// HTTP client for one draftmill server.
pub struct StatusClient {
    client: Client,
    base_url: String,
}

impl StatusClient {
    /// Create a client for the given base URL (no trailing slash needed).
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn stage_url(&self, subject_id: Uuid, stage: Stage, tail: &str) -> String {
        format!(
            "{}/subjects/{}/stages/{}/{}",
            self.base_url, subject_id, stage, tail
        )
    }

    /// Trigger a stage. Returns the job snapshot the dispatcher recorded
    /// (fresh or idempotently re-served).
    pub async fn trigger(
        &self,
        subject_id: Uuid,
        stage: Stage,
        payload: &TriggerPayload,
    ) -> Result<JobSnapshot> {
        let response = self
            .client
            .post(self.stage_url(subject_id, stage, "trigger"))
            .json(payload)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response.json().await?);
        }
        Err(decode_error(response).await)
    }

    /// Fetch the assembled document for a completed stage. `None` when no
    /// completed run exists (or the artifact was invalidated and nothing
    /// has rebuilt it server-side yet).
    pub async fn document(
        &self,
        subject_id: Uuid,
        stage: Stage,
    ) -> Result<Option<serde_json::Value>> {
        let response = self
            .client
            .get(self.stage_url(subject_id, stage, "document"))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if response.status().is_success() {
            return Ok(Some(response.json().await?));
        }
        Err(decode_error(response).await)
    }

    /// Read the job snapshot for a key. `None` when the stage has never
    /// been triggered for this subject.
    pub async fn status(&self, subject_id: Uuid, stage: Stage) -> Result<Option<JobSnapshot>> {
        let response = self
            .client
            .get(self.stage_url(subject_id, stage, "status"))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if response.status().is_success() {
            return Ok(Some(response.json().await?));
        }
        Err(decode_error(response).await)
    }
}

/// Map a non-success response back to the core error taxonomy.
async fn decode_error(response: reqwest::Response) -> Error {
    let status = response.status();
    let body = match response.json::<ErrorBody>().await {
        Ok(body) => body,
        Err(_) => return Error::Request(format!("server returned {status}")),
    };

    match body.error.as_str() {
        "prerequisite_not_met" => match (body.stage, body.missing) {
            (Some(stage), Some(missing)) => Error::PrerequisiteNotMet { stage, missing },
            _ => Error::Request(body.message),
        },
        "invalid_payload" => Error::InvalidPayload(body.message),
        "not_found" => Error::NotFound(body.message),
        _ => Error::Request(format!("{}: {}", body.error, body.message)),
    }
}

#[async_trait]
impl SnapshotSource for StatusClient {
    async fn fetch(&self, subject_id: Uuid, stage: Stage) -> Result<Option<JobSnapshot>> {
        self.status(subject_id, stage).await
    }
}
