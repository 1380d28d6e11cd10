//! # draftmill-engine
//!
//! The asynchronous generation workflow engine.
//!
//! This crate provides:
//! - The job dispatcher: precondition checks, the idempotent trigger write,
//!   and the fire-and-forget handoff to the worker channel
//! - The stage executor: template resolution, context building, placeholder
//!   injection, model invocation, response parsing, terminal writeback
//! - The channel-fed worker pool with broadcast lifecycle events
//! - The response parser and the document assembler (pure transforms)
//!
//! ## Example
//!
//! ```ignore
//! use draftmill_engine::{JobDispatcher, StageExecutor, StageWorker, WorkerConfig};
//!
//! let executor = Arc::new(StageExecutor::new(jobs.clone(), templates, backend));
//! let handle = StageWorker::new(executor, WorkerConfig::default()).start();
//! let dispatcher = JobDispatcher::new(jobs, subjects, handle.queue());
//!
//! // Returns as soon as the processing row is written; execution is detached.
//! let snapshot = dispatcher
//!     .trigger(subject_id, Stage::SourceAnalysis, payload)
//!     .await?;
//! ```

pub mod assemble;
pub mod context;
pub mod dispatcher;
pub mod executor;
pub mod inject;
pub mod parse;
pub mod worker;

// Re-export core types
pub use draftmill_core::*;

pub use assemble::{assemble, assemble_sections, Block, ListItem, RichDocument, Span};
pub use context::{build_context, filter_sections, serialize_value};
pub use dispatcher::JobDispatcher;
pub use executor::{ExecutionOutcome, StageExecutor, StageTask};
pub use inject::{inject_placeholders, unresolved_placeholders};
pub use parse::parse_sections;
pub use worker::{StageWorker, WorkerConfig, WorkerEvent, WorkerHandle};
