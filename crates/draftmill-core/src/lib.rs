//! # draftmill-core
//!
//! Core types, traits, and abstractions for the draftmill generation
//! workflow engine.
//!
//! This crate provides the foundational data structures (stages, jobs,
//! templates, artifacts) and the trait seams (job store, template store,
//! generation backend) that the other draftmill crates depend on. It
//! performs no I/O of its own.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
