//! API integration tests: the full trigger/poll/document contract over a
//! real listener, driven by the client crate, plus router-level error
//! mapping checks.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use uuid::Uuid;

use draftmill_api::{router, AppState};
use draftmill_client::{PollConfig, PollOutcome, Poller, StatusClient};
use draftmill_core::{
    ArtifactStore, CreateTemplateRequest, Error, JobState, JobStore, Stage, SubjectStore,
    TemplateStore, TriggerPayload,
};
use draftmill_db::{MemoryArtifactStore, MemoryJobStore, MemorySubjectStore, MemoryTemplateStore};
use draftmill_engine::{JobDispatcher, StageExecutor, StageWorker, WorkerConfig, WorkerHandle};
use draftmill_inference::MockBackend;

struct App {
    base_url: String,
    subjects: Arc<MemorySubjectStore>,
    artifacts: Arc<MemoryArtifactStore>,
    // Keep the worker handle alive for the duration of the test; dropping it
    // signals the worker to shut down and closes the task queue.
    _worker: WorkerHandle,
}

async fn seed_templates(templates: &MemoryTemplateStore) {
    for stage in Stage::ALL {
        templates
            .create(CreateTemplateRequest {
                workflow: "proposal".to_string(),
                stage,
                category: "general".to_string(),
                system_instruction: format!("You perform {stage}."),
                user_template: "Context: {[SELECTED SECTIONS]}".to_string(),
                format_instruction: "Respond in markdown.".to_string(),
                active: true,
            })
            .await
            .unwrap();
    }
}

fn build_state(backend: MockBackend) -> (AppState, Arc<MemorySubjectStore>, Arc<MemoryArtifactStore>, Arc<MemoryTemplateStore>, WorkerHandle) {
    let jobs = Arc::new(MemoryJobStore::new());
    let subjects = Arc::new(MemorySubjectStore::new());
    let templates = Arc::new(MemoryTemplateStore::new());
    let artifacts = Arc::new(MemoryArtifactStore::new());

    let executor = Arc::new(StageExecutor::new(
        jobs.clone() as Arc<dyn JobStore>,
        templates.clone() as Arc<dyn TemplateStore>,
        Arc::new(backend),
    ));
    let handle = StageWorker::new(executor, WorkerConfig::default()).start();
    let dispatcher = Arc::new(JobDispatcher::new(
        jobs.clone() as Arc<dyn JobStore>,
        subjects.clone() as Arc<dyn SubjectStore>,
        handle.queue(),
    ));

    let state = AppState {
        dispatcher,
        jobs: jobs as Arc<dyn JobStore>,
        artifacts: artifacts.clone() as Arc<dyn ArtifactStore>,
    };
    (state, subjects, artifacts, templates, handle)
}

/// Serve the app on an ephemeral port.
async fn spawn_app(backend: MockBackend) -> App {
    let (state, subjects, artifacts, templates, handle) = build_state(backend);
    seed_templates(&templates).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    App {
        base_url: format!("http://{addr}"),
        subjects,
        artifacts,
        _worker: handle,
    }
}

fn fast_poll() -> PollConfig {
    PollConfig::default()
        .with_interval(Duration::from_millis(10))
        .with_max_attempts(200)
}

#[tokio::test]
async fn trigger_then_poll_to_completion_over_http() {
    let app = spawn_app(MockBackend::new().with_response("## Intro\nHello\n## Body\nWorld")).await;
    let subject = app.subjects.create("P1").await.unwrap();
    let client = StatusClient::new(app.base_url.clone());

    let snapshot = client
        .trigger(subject, Stage::SourceAnalysis, &TriggerPayload::default())
        .await
        .unwrap();
    assert_eq!(snapshot.state, JobState::Processing);
    assert!(snapshot.started_at.is_some());

    let poller = Poller::new(client, fast_poll());
    let outcome = poller.wait(subject, Stage::SourceAnalysis).await.unwrap();
    let PollOutcome::Completed(snap) = outcome else {
        panic!("expected completion");
    };
    let result = snap.result.unwrap();
    assert_eq!(result.sections.len(), 2);
    assert_eq!(result.sections[0].title, "Intro");
    assert_eq!(result.sections[0].body, "Hello");
}

#[tokio::test]
async fn premature_concept_trigger_returns_400_prerequisite_not_met() {
    let app = spawn_app(MockBackend::new().with_response("## A\nx")).await;
    let subject = app.subjects.create("P1").await.unwrap();
    let client = StatusClient::new(app.base_url.clone());

    let err = client
        .trigger(
            subject,
            Stage::ConceptAnalysis,
            &TriggerPayload::with_selection(["A"]),
        )
        .await
        .unwrap_err();

    match err {
        Error::PrerequisiteNotMet { stage, missing } => {
            assert_eq!(stage, Stage::ConceptAnalysis);
            assert_eq!(missing, Stage::SourceAnalysis);
        }
        other => panic!("expected PrerequisiteNotMet over the wire, got {other}"),
    }
}

#[tokio::test]
async fn status_is_none_before_any_trigger() {
    let app = spawn_app(MockBackend::new()).await;
    let subject = app.subjects.create("P1").await.unwrap();
    let client = StatusClient::new(app.base_url.clone());

    let status = client.status(subject, Stage::SourceAnalysis).await.unwrap();
    assert!(status.is_none());
}

#[tokio::test]
async fn idempotent_retrigger_returns_the_same_job_over_http() {
    let app = spawn_app(
        MockBackend::new()
            .with_response("## A\nx")
            .with_latency_ms(300),
    )
    .await;
    let subject = app.subjects.create("P1").await.unwrap();
    let client = StatusClient::new(app.base_url.clone());

    let first = client
        .trigger(subject, Stage::SourceAnalysis, &TriggerPayload::default())
        .await
        .unwrap();
    let second = client
        .trigger(subject, Stage::SourceAnalysis, &TriggerPayload::default())
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn document_is_assembled_and_invalidated_on_selection_change() {
    let app = spawn_app(
        MockBackend::new()
            .with_response("## Findings\n- point **one**\n- point two\n\n| K | V |\n|---|---|\n| a | 1 |"),
    )
    .await;
    let subject = app.subjects.create("P1").await.unwrap();
    let client = StatusClient::new(app.base_url.clone());

    // Complete the entry stage, then a downstream stage with selection S1.
    client
        .trigger(subject, Stage::SourceAnalysis, &TriggerPayload::default())
        .await
        .unwrap();
    let poller = Poller::new(StatusClient::new(app.base_url.clone()), fast_poll());
    poller.wait(subject, Stage::SourceAnalysis).await.unwrap();

    let s1 = TriggerPayload::with_selection(["Findings"]);
    client
        .trigger(subject, Stage::ReferenceAnalysis, &s1)
        .await
        .unwrap();
    poller.wait(subject, Stage::ReferenceAnalysis).await.unwrap();

    // First read assembles and records the artifact under S1.
    let document = client
        .document(subject, Stage::ReferenceAnalysis)
        .await
        .unwrap()
        .unwrap();
    let blocks = document["blocks"].as_array().unwrap();
    assert!(blocks.iter().any(|b| b["type"] == "heading"));
    assert!(blocks.iter().any(|b| b["type"] == "list"));
    assert!(blocks.iter().any(|b| b["type"] == "table"));
    assert!(app
        .artifacts
        .get_fresh(subject, Stage::ReferenceAnalysis, &["Findings".to_string()])
        .await
        .unwrap()
        .is_some());

    // Supersede the run with a different selection. The recorded artifact
    // no longer matches and must be cleared on the next read, then rebuilt
    // from the new run.
    let s2 = TriggerPayload::with_selection(["Findings", "Intro"]);
    client
        .trigger(subject, Stage::ReferenceAnalysis, &s2)
        .await
        .unwrap();
    poller.wait(subject, Stage::ReferenceAnalysis).await.unwrap();

    let rebuilt = client
        .document(subject, Stage::ReferenceAnalysis)
        .await
        .unwrap();
    assert!(rebuilt.is_some());
    let fresh = app
        .artifacts
        .get_fresh(
            subject,
            Stage::ReferenceAnalysis,
            &["Findings".to_string(), "Intro".to_string()],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.selection.len(), 2);
}

#[tokio::test]
async fn document_404_when_stage_not_completed() {
    let app = spawn_app(MockBackend::new()).await;
    let subject = app.subjects.create("P1").await.unwrap();
    let client = StatusClient::new(app.base_url.clone());

    let document = client
        .document(subject, Stage::SourceAnalysis)
        .await
        .unwrap();
    assert!(document.is_none());
}

// ---------------------------------------------------------------------------
// Router-level mapping checks (no listener needed)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_endpoint_responds_ok() {
    let (state, _, _, _, _worker) = build_state(MockBackend::new());
    let response = router(state)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_stage_name_is_404() {
    let (state, subjects, _, _, _worker) = build_state(MockBackend::new());
    let subject = subjects.create("P1").await.unwrap();

    let response = router(state)
        .oneshot(
            Request::get(format!("/subjects/{subject}/stages/embedding/status"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_subject_trigger_is_404() {
    let (state, _, _, templates, _worker) = build_state(MockBackend::new());
    seed_templates(&templates).await;

    let response = router(state)
        .oneshot(
            Request::post(format!(
                "/subjects/{}/stages/source-analysis/trigger",
                Uuid::now_v7()
            ))
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn premature_trigger_is_400_at_the_http_layer() {
    let (state, subjects, _, templates, _worker) = build_state(MockBackend::new());
    seed_templates(&templates).await;
    let subject = subjects.create("P1").await.unwrap();

    let response = router(state)
        .oneshot(
            Request::post(format!(
                "/subjects/{subject}/stages/concept-analysis/trigger"
            ))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"selected_ids": ["A"]}"#))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_payload_trigger_is_400() {
    let (state, subjects, _, templates, _worker) = build_state(MockBackend::new());
    seed_templates(&templates).await;
    let subject = subjects.create("P1").await.unwrap();

    // Blank selected id violates the payload shape rules on any stage.
    let response = router(state)
        .oneshot(
            Request::post(format!(
                "/subjects/{subject}/stages/source-analysis/trigger"
            ))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"selected_ids": ["  "]}"#))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
