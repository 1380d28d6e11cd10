//! Read-through trigger cache.
//!
//! The front end caches completed snapshots so a page reload does not
//! re-trigger a stage whose inputs have not changed. Entries are keyed by
//! (subject, stage, selection fingerprint); changing the selection changes
//! the key, so stale entries are simply never hit. The cache is never
//! authoritative — the server job store remains the source of truth, and
//! a miss just means "poll the server".

use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use draftmill_core::{JobSnapshot, JobState, Stage};

/// Order-insensitive SHA-256 fingerprint of a selection list.
pub fn selection_fingerprint(selection: &[String]) -> String {
    let mut ids: Vec<&str> = selection.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Client-local cache of completed stage snapshots.
#[derive(Default)]
pub struct TriggerCache {
    entries: Mutex<HashMap<(Uuid, Stage, String), JobSnapshot>>,
}

impl TriggerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached completed snapshot for this key and selection, if any.
    pub fn fresh(
        &self,
        subject_id: Uuid,
        stage: Stage,
        selection: &[String],
    ) -> Option<JobSnapshot> {
        let key = (subject_id, stage, selection_fingerprint(selection));
        self.entries.lock().unwrap().get(&key).cloned()
    }

    /// Record a snapshot under its selection. Only `completed` snapshots
    /// are worth keeping — anything else must go back through the poller.
    pub fn record(&self, selection: &[String], snapshot: &JobSnapshot) {
        if snapshot.state != JobState::Completed {
            return;
        }
        let key = (
            snapshot.subject_id,
            snapshot.stage,
            selection_fingerprint(selection),
        );
        self.entries.lock().unwrap().insert(key, snapshot.clone());
    }

    /// Drop every entry for a (subject, stage) key, any selection.
    pub fn invalidate(&self, subject_id: Uuid, stage: Stage) {
        self.entries
            .lock()
            .unwrap()
            .retain(|(s, st, _), _| !(*s == subject_id && *st == stage));
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
