//! HTTP-level tests for the Ollama backend against a mock server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use draftmill_core::{Error, GenerationBackend, GenerationOptions, Stage};
use draftmill_inference::OllamaBackend;

fn backend_for(server: &MockServer) -> OllamaBackend {
    OllamaBackend::with_config(server.uri(), "test-model".to_string())
}

#[tokio::test]
async fn generate_sends_system_and_user_messages() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "stream": false,
            "messages": [
                {"role": "system", "content": "You are an analyst."},
                {"role": "user", "content": "Analyze the document."}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "## Summary\nLooks fine."}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let out = backend
        .generate(
            "You are an analyst.",
            "Analyze the document.",
            &GenerationOptions::for_stage(Stage::SourceAnalysis),
        )
        .await
        .unwrap();

    assert_eq!(out, "## Summary\nLooks fine.");
}

#[tokio::test]
async fn deterministic_stage_pins_temperature_and_seed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "options": {"temperature": 0.0, "num_predict": 1024}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "ok"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    backend
        .generate(
            "",
            "x",
            &GenerationOptions::for_stage(Stage::ConceptAnalysis),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn empty_system_instruction_is_omitted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "messages": [{"role": "user", "content": "just the prompt"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "ok"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    backend
        .generate(
            "",
            "just the prompt",
            &GenerationOptions::for_stage(Stage::SourceAnalysis),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn server_error_surfaces_as_inference_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = backend
        .generate(
            "",
            "x",
            &GenerationOptions::for_stage(Stage::SourceAnalysis),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Inference(_)));
    assert!(err.to_string().contains("model not loaded"));
}

#[tokio::test]
async fn malformed_body_surfaces_as_inference_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = backend
        .generate(
            "",
            "x",
            &GenerationOptions::for_stage(Stage::SourceAnalysis),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Inference(_)));
}
