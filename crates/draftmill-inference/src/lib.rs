//! # draftmill-inference
//!
//! Generation backend abstraction for draftmill.
//!
//! The engine talks to the hosted model through the narrow
//! [`GenerationBackend`](draftmill_core::GenerationBackend) trait: system
//! instruction and prompt in, raw text out, with per-stage limits on
//! response length and sampling determinism. This crate provides the
//! Ollama HTTP implementation and a deterministic mock for tests.

pub mod mock;
pub mod ollama;

// Re-export core types
pub use draftmill_core::{GenerationBackend, GenerationOptions};

pub use mock::MockBackend;
pub use ollama::OllamaBackend;
