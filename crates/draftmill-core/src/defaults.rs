//! Centralized default constants for the draftmill system.
//!
//! **This module is the single source of truth** for all shared default
//! values. All crates should reference these constants instead of defining
//! their own magic numbers.

// =============================================================================
// POLLING
// =============================================================================

/// Fixed interval between status polls, in seconds.
pub const POLL_INTERVAL_SECS: u64 = 3;

/// A `processing` job older than this is treated by the poller as an
/// implicit failure even if the store was never updated. Must exceed the
/// largest per-stage poll ceiling.
pub const STALE_PROCESSING_SECS: u64 = 900;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name.
pub const GEN_MODEL: &str = "gpt-oss:20b";

/// Timeout for a single generation request in seconds. Kept shorter than
/// every per-stage poll ceiling so a hung inference call surfaces as a
/// failed job instead of a job stuck in `processing`.
pub const GEN_TIMEOUT_SECS: u64 = 240;

/// Seed used when a stage requests deterministic sampling.
pub const GEN_DETERMINISTIC_SEED: i64 = 42;

/// Sampling temperature for non-deterministic stages.
pub const GEN_TEMPERATURE: f32 = 0.8;

// =============================================================================
// WORKER
// =============================================================================

/// Maximum number of stage executions running concurrently.
pub const WORKER_MAX_CONCURRENT: usize = 4;

/// Capacity of the dispatcher -> worker task channel.
pub const WORKER_QUEUE_CAPACITY: usize = 64;

/// Broadcast channel capacity for worker events.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// TEMPLATES
// =============================================================================

/// Default workflow name templates are resolved under.
pub const WORKFLOW: &str = "proposal";

/// Default template category.
pub const CATEGORY: &str = "general";

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Maximum request body size in bytes (1 MB; trigger payloads are small).
pub const MAX_BODY_SIZE_BYTES: usize = 1024 * 1024;

/// Default CORS max-age in seconds (1 hour).
pub const CORS_MAX_AGE_SECS: u64 = 3600;
