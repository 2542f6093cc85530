//! Change-Log Store
//!
//! Owns the three maps of the engine and their persistence:
//! - message history: append-only log of entries per entity key
//! - deleted messages: last `Deleted` entry per key, for O(1) "is it gone"
//! - media files: one reference per distinct media object
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌─────────┐    ┌──────────────┐    ┌───────────────┐    ┌─────────────────┐
//! │ Intake  │───►│ record()     │───►│ append to log │───►│ serialize + save│
//! │ event   │    │ id+timestamp │    │ (+ deletion)  │    │ (best effort)   │
//! └─────────┘    └──────────────┘    └───────────────┘    └─────────────────┘
//!
//! Read Path:
//! ┌───────────────┐    ┌──────────────────────────────┐
//! │ UI / Façade   │───►│ get_log / search / export /  │───► borrowed or owned copies
//! └───────────────┘    │ stats (never mutable access) │
//!                      └──────────────────────────────┘
//! ```
//!
//! Persistence failures are logged and swallowed: the in-memory state is
//! authoritative for the live session.

mod persistence;
mod query;
mod record;

use tracing::{error, info};

use crate::config::HistoryConfig;
use crate::types::{
    EntityKey, EntryPayload, HistoryAction, HistoryEntry, HistoryExport, HistoryStats,
    MediaReference, MessageSnapshot,
};

pub use persistence::{
    FilePersistence, HistoryPersistence, MemoryPersistence, PersistedHistory, QueuedPersistence,
};

/// Append-only change log for every observed message
pub struct ChangeLogStore {
    pub(crate) state: PersistedHistory,
    persistence: Option<Box<dyn HistoryPersistence>>,
}

impl ChangeLogStore {
    /// Create a store without persistence
    pub fn in_memory() -> Self {
        Self {
            state: PersistedHistory::default(),
            persistence: None,
        }
    }

    /// Open the file-backed store described by `config`
    pub fn open(config: &HistoryConfig) -> Self {
        let file = FilePersistence::new(config.document_path());

        if config.queued_writes {
            Self::with_persistence(QueuedPersistence::new(file))
        } else {
            Self::with_persistence(file)
        }
    }

    /// Create a store over an injected backend and load its document.
    ///
    /// A missing or unreadable document yields an empty store.
    pub fn with_persistence<P: HistoryPersistence + 'static>(backend: P) -> Self {
        let state = match backend.load() {
            Ok(Some(document)) => match PersistedHistory::from_json(&document) {
                Ok(state) => state,
                Err(e) => {
                    error!(error = %e, "Failed to load stored history");
                    PersistedHistory::default()
                }
            },
            Ok(None) => PersistedHistory::default(),
            Err(e) => {
                error!(error = %e, "Failed to load stored history");
                PersistedHistory::default()
            }
        };

        info!(
            messages = state.message_history.len(),
            deleted = state.deleted_messages.len(),
            media = state.media_files.len(),
            "Loaded message history"
        );

        Self {
            state,
            persistence: Some(Box::new(backend)),
        }
    }

    /// Rebuild a store from a persisted document (no backend attached)
    pub fn from_document(document: PersistedHistory) -> Self {
        Self {
            state: document,
            persistence: None,
        }
    }

    /// The full state as it would be persisted
    pub fn document(&self) -> &PersistedHistory {
        &self.state
    }

    /// Owned copy of the persisted document
    pub fn to_document(&self) -> PersistedHistory {
        self.state.clone()
    }

    /// Discard all logs, deletions and media references together.
    ///
    /// Used on session boundaries. Does not write to the backend.
    pub fn clear(&mut self) {
        self.state = PersistedHistory::default();
    }

    /// Wait for queued persistence writes to land
    pub fn flush(&self) {
        if let Some(backend) = &self.persistence {
            if let Err(e) = backend.flush() {
                error!(error = %e, "Failed to flush history writes");
            }
        }
    }

    /// Serialize and save the whole state, logging any failure
    pub(crate) fn persist(&self) {
        let Some(backend) = &self.persistence else {
            return;
        };

        let document = match self.state.to_json() {
            Ok(document) => document,
            Err(e) => {
                error!(error = %e, "Failed to serialize history");
                return;
            }
        };

        if let Err(e) = backend.save(document) {
            error!(error = %e, "Failed to save history");
        }
    }

    /// Entries recorded for `key`, oldest first; empty if unknown
    pub fn get_log(&self, key: &EntityKey) -> &[HistoryEntry] {
        self.state
            .message_history
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Last `Deleted` entry recorded for `key`
    pub fn get_deletion(&self, key: &EntityKey) -> Option<&HistoryEntry> {
        self.state.deleted_messages.get(key)
    }

    /// True if the key has a non-empty log or a deletion record
    pub fn has_any_history(&self, key: &EntityKey) -> bool {
        !self.get_log(key).is_empty() || self.state.deleted_messages.contains_key(key)
    }

    /// Most recent known snapshot of the message
    pub fn latest_snapshot(&self, key: &EntityKey) -> Option<&MessageSnapshot> {
        self.get_log(key).last().and_then(HistoryEntry::latest_snapshot)
    }

    pub fn get_media(&self, id: &str) -> Option<&MediaReference> {
        self.state.media_files.get(id)
    }
}

impl Default for ChangeLogStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for ChangeLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeLogStore")
            .field("messages", &self.state.message_history.len())
            .field("deleted", &self.state.deleted_messages.len())
            .field("media", &self.state.media_files.len())
            .field("persistent", &self.persistence.is_some())
            .finish()
    }
}

// Write and query operations live in submodules
impl ChangeLogStore {
    // Recording (from record.rs)
    pub fn record(&mut self, key: EntityKey, action: HistoryAction, payload: EntryPayload) -> HistoryEntry {
        record::record(self, key, action, payload)
    }

    pub fn record_at(
        &mut self,
        key: EntityKey,
        action: HistoryAction,
        payload: EntryPayload,
        timestamp: i64,
    ) -> HistoryEntry {
        record::record_at(self, key, action, payload, timestamp)
    }

    pub fn register_media(&mut self, reference: MediaReference) {
        record::register_media(self, reference)
    }

    pub fn mark_materialized(&mut self, id: &str, local_url: Option<String>, at: i64) -> bool {
        record::mark_materialized(self, id, local_url, at)
    }

    pub fn register_media_from(&mut self, message: &MessageSnapshot) -> Option<MediaReference> {
        record::register_media_from(self, message)
    }

    pub fn force_create_history(&mut self, message: &MessageSnapshot) -> usize {
        record::force_create_history(self, message)
    }

    // Query operations (from query.rs)
    pub fn search(&self, query: &str, conversation_id: Option<i64>) -> Vec<HistoryEntry> {
        query::search(self, query, conversation_id)
    }

    pub fn export_all(&self, conversation_id: Option<i64>) -> HistoryExport {
        query::export_all(self, conversation_id)
    }

    pub fn stats(&self) -> HistoryStats {
        query::stats(self)
    }

    pub fn media_for_conversation(&self, conversation_id: i64) -> Vec<MediaReference> {
        query::media_for_conversation(self, conversation_id)
    }

    pub fn media_for_message(&self, key: &EntityKey) -> Vec<MediaReference> {
        query::media_for_message(self, key)
    }
}
