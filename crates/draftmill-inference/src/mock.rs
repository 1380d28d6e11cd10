//! Mock generation backend for deterministic testing.
//!
//! Returns scripted responses and records every call so tests can assert
//! on the exact system instruction, prompt, and options the engine sent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use draftmill_core::{Error, GenerationBackend, GenerationOptions, Result};

/// A recorded generation call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub prompt: String,
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, Default)]
struct MockConfig {
    default_response: String,
    /// Responses keyed by a substring of the system instruction or prompt;
    /// first match wins.
    prompt_responses: Vec<(String, String)>,
    fail_with: Option<String>,
    latency_ms: u64,
}

/// Mock generation backend.
#[derive(Clone)]
pub struct MockBackend {
    config: Arc<MockConfig>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend returning an empty default response.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig {
                default_response: "Mock response".to_string(),
                ..Default::default()
            }),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the response returned when no prompt mapping matches.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Return `response` whenever the system instruction or the prompt
    /// contains `needle`.
    pub fn with_response_for(
        mut self,
        needle: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .prompt_responses
            .push((needle.into(), response.into()));
        self
    }

    /// Make every call fail with the given message.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).fail_with = Some(message.into());
        self
    }

    /// Add simulated latency to every call.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
            options: *options,
        });

        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        if let Some(message) = &self.config.fail_with {
            return Err(Error::Inference(message.clone()));
        }

        for (needle, response) in &self.config.prompt_responses {
            if prompt.contains(needle.as_str()) || system.contains(needle.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(self.config.default_response.clone())
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftmill_core::Stage;

    #[tokio::test]
    async fn test_default_response_and_call_log() {
        let backend = MockBackend::new().with_response("## A\nbody");
        let opts = GenerationOptions::for_stage(Stage::SourceAnalysis);

        let out = backend.generate("sys", "analyze this", &opts).await.unwrap();
        assert_eq!(out, "## A\nbody");
        assert_eq!(backend.call_count(), 1);

        let call = &backend.calls()[0];
        assert_eq!(call.system, "sys");
        assert_eq!(call.prompt, "analyze this");
        assert!(call.options.deterministic);
    }

    #[tokio::test]
    async fn test_prompt_mapping_first_match_wins() {
        let backend = MockBackend::new()
            .with_response_for("outline", "## Outline\n1")
            .with_response_for("line", "never reached")
            .with_response("fallback");
        let opts = GenerationOptions::for_stage(Stage::OutlineGeneration);

        let out = backend
            .generate("", "produce an outline", &opts)
            .await
            .unwrap();
        assert_eq!(out, "## Outline\n1");

        let out = backend.generate("", "unrelated", &opts).await.unwrap();
        assert_eq!(out, "fallback");
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let backend = MockBackend::new().with_failure("quota exceeded");
        let opts = GenerationOptions::for_stage(Stage::SourceAnalysis);

        let err = backend.generate("", "x", &opts).await.unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
        assert!(err.to_string().contains("quota exceeded"));
        // The call is still recorded so tests can assert on retry behavior.
        assert_eq!(backend.call_count(), 1);
    }
}
