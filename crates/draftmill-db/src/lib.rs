//! # draftmill-db
//!
//! PostgreSQL store layer for the draftmill workflow engine.
//!
//! This crate provides:
//! - Connection pool management
//! - The durable job store with the atomic at-most-one-active trigger write
//! - The prompt template store with most-recently-activated resolution
//! - The artifact store with selection-based staleness
//! - In-memory store implementations for integration tests and embedded use
//!
//! ## Example
//!
//! ```rust,ignore
//! use draftmill_db::{create_pool, PgJobStore};
//! use draftmill_core::{JobStore, NewJob, Stage, TriggerPayload};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool("postgres://localhost/draftmill").await?;
//!     let jobs = PgJobStore::new(pool);
//!
//!     let outcome = jobs.begin(NewJob {
//!         subject_id: subject,
//!         stage: Stage::SourceAnalysis,
//!         payload: TriggerPayload::default(),
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod jobs;
pub mod memory;
pub mod pool;
pub mod subjects;
pub mod templates;

// Re-export core types
pub use draftmill_core::*;

// Re-export store implementations
pub use artifacts::PgArtifactStore;
pub use jobs::PgJobStore;
pub use memory::{MemoryArtifactStore, MemoryJobStore, MemorySubjectStore, MemoryTemplateStore};
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use subjects::PgSubjectStore;
pub use templates::PgTemplateStore;
