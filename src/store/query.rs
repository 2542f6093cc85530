//! Query operations for the change-log store
//!
//! Read-side façade: search, export, statistics and media lookups. All
//! results are owned copies; nothing here hands out mutable access.

use rayon::prelude::*;

use crate::types::{
    EntityKey, HistoryAction, HistoryEntry, HistoryExport, HistoryStats, MediaReference,
};

use super::ChangeLogStore;

/// Threshold for using parallel search (entry count)
const PARALLEL_SEARCH_THRESHOLD: usize = 5000;

/// Case-insensitive substring search over entry texts, newest first.
///
/// Each entry is matched against its latest snapshot (edited version if
/// present, else the original). Service messages carry no text and never
/// match.
pub fn search(store: &ChangeLogStore, query: &str, conversation_id: Option<i64>) -> Vec<HistoryEntry> {
    let needle = query.to_lowercase();

    let candidates: Vec<&HistoryEntry> = store
        .state
        .message_history
        .iter()
        .filter(|(key, _)| conversation_id.map_or(true, |c| key.in_conversation(c)))
        .flat_map(|(_, entries)| entries.iter())
        .collect();

    let mut results: Vec<HistoryEntry> = if candidates.len() > PARALLEL_SEARCH_THRESHOLD {
        candidates
            .par_iter()
            .filter(|entry| matches_text(entry, &needle))
            .map(|entry| (*entry).clone())
            .collect()
    } else {
        candidates
            .iter()
            .filter(|entry| matches_text(entry, &needle))
            .map(|entry| (*entry).clone())
            .collect()
    };

    // Stable: entries sharing a timestamp keep log order
    results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    results
}

fn matches_text(entry: &HistoryEntry, needle: &str) -> bool {
    entry
        .latest_snapshot()
        .and_then(|snapshot| snapshot.text())
        .map(|text| text.to_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Owned copy of the store, optionally scoped to one conversation
pub fn export_all(store: &ChangeLogStore, conversation_id: Option<i64>) -> HistoryExport {
    let in_scope = |key: &EntityKey| conversation_id.map_or(true, |c| key.in_conversation(c));

    HistoryExport {
        logs: store
            .state
            .message_history
            .iter()
            .filter(|(key, _)| in_scope(key))
            .map(|(key, entries)| (*key, entries.clone()))
            .collect(),
        deletions: store
            .state
            .deleted_messages
            .iter()
            .filter(|(key, _)| in_scope(key))
            .map(|(key, entry)| (*key, entry.clone()))
            .collect(),
        media: store
            .state
            .media_files
            .values()
            .filter(|media| in_scope(&media.key))
            .cloned()
            .collect(),
    }
}

/// Aggregate counters
pub fn stats(store: &ChangeLogStore) -> HistoryStats {
    let state = &store.state;

    HistoryStats {
        total_messages: state.message_history.len(),
        edited_messages: state
            .message_history
            .values()
            .filter(|entries| entries.iter().any(|e| e.action == HistoryAction::Edited))
            .count(),
        deleted_messages: state.deleted_messages.len(),
        stored_media_files: state.media_files.len(),
    }
}

/// Media last seen in the given conversation
pub fn media_for_conversation(store: &ChangeLogStore, conversation_id: i64) -> Vec<MediaReference> {
    store
        .state
        .media_files
        .values()
        .filter(|media| media.key.in_conversation(conversation_id))
        .cloned()
        .collect()
}

/// Media last seen on the given message
pub fn media_for_message(store: &ChangeLogStore, key: &EntityKey) -> Vec<MediaReference> {
    store
        .state
        .media_files
        .values()
        .filter(|media| media.key == *key)
        .cloned()
        .collect()
}
