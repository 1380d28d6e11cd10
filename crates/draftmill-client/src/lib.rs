//! # draftmill-client
//!
//! The client side of the trigger/poll contract.
//!
//! This crate provides:
//! - [`StatusClient`]: HTTP trigger and status calls against a draftmill
//!   server
//! - [`Poller`]: the bounded fixed-interval observation loop, generic over
//!   any snapshot source, with a defensive stale-processing timeout
//! - [`TriggerCache`]: a read-through cache keyed by (subject, stage,
//!   selection fingerprint) whose only job is avoiding redundant triggers
//!   across page reloads — the server job store stays authoritative

pub mod cache;
pub mod http;
pub mod poller;

// Re-export core types
pub use draftmill_core::*;

pub use cache::{selection_fingerprint, TriggerCache};
pub use http::StatusClient;
pub use poller::{PollConfig, PollOutcome, Poller, SnapshotSource};
