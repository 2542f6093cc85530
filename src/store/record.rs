//! Write operations for the change-log store

use tracing::{debug, warn};

use crate::media::extract_media;
use crate::reconstruct::synthesize_versions;
use crate::types::{
    ChangeSet, EntityKey, EntryPayload, HistoryAction, HistoryEntry, MediaReference,
    MessageSnapshot,
};
use crate::utils::current_timestamp;

use super::ChangeLogStore;

/// Append an entry timestamped now
pub fn record(
    store: &mut ChangeLogStore,
    key: EntityKey,
    action: HistoryAction,
    payload: EntryPayload,
) -> HistoryEntry {
    record_at(store, key, action, payload, current_timestamp())
}

/// Append an entry with an explicit timestamp.
///
/// The log is never reordered: entries keep insertion order even when the
/// event source delivers them out of timestamp order.
pub fn record_at(
    store: &mut ChangeLogStore,
    key: EntityKey,
    action: HistoryAction,
    payload: EntryPayload,
    timestamp: i64,
) -> HistoryEntry {
    let entry = HistoryEntry::new(key, action, timestamp, payload);

    store
        .state
        .message_history
        .entry(key)
        .or_default()
        .push(entry.clone());

    if action == HistoryAction::Deleted {
        store.state.deleted_messages.insert(key, entry.clone());
    }

    store.persist();

    debug!(
        %action,
        message_id = key.message_id,
        conversation_id = key.conversation_id,
        "Recorded history entry"
    );
    entry
}

/// Upsert a media reference by its content-derived id
pub fn register_media(store: &mut ChangeLogStore, reference: MediaReference) {
    match store.state.media_files.get_mut(&reference.id) {
        Some(existing) => existing.merge_from(reference),
        None => {
            store.state.media_files.insert(reference.id.clone(), reference);
        }
    }

    store.persist();
}

/// Flag a known media reference as fetched into local storage
pub fn mark_materialized(
    store: &mut ChangeLogStore,
    id: &str,
    local_url: Option<String>,
    at: i64,
) -> bool {
    let Some(reference) = store.state.media_files.get_mut(id) else {
        return false;
    };

    reference.materialized = true;
    reference.downloaded_at = Some(at);
    if local_url.is_some() {
        reference.local_url = local_url;
    }

    store.persist();
    true
}

/// Extract and register the media carried by `message`.
///
/// Returns the stored reference. Unexpected media shapes are logged and
/// skipped; they never affect the entry recorded for the message.
pub fn register_media_from(
    store: &mut ChangeLogStore,
    message: &MessageSnapshot,
) -> Option<MediaReference> {
    match extract_media(message) {
        Ok(Some(reference)) => {
            let id = reference.id.clone();
            register_media(store, reference);
            store.state.media_files.get(&id).cloned()
        }
        Ok(None) => None,
        Err(e) => {
            warn!(key = %message.key(), error = %e, "Skipping media reference");
            None
        }
    }
}

/// Create history for a message discovered without any recorded entries.
///
/// Edited messages get a synthetic version sequence (see
/// [`synthesize_versions`]); anything else gets a single `Created` entry.
/// No-op when the key already has history. Returns the number of entries
/// recorded.
pub fn force_create_history(store: &mut ChangeLogStore, message: &MessageSnapshot) -> usize {
    let key = message.key();

    if store.has_any_history(&key) {
        return 0;
    }

    let content = match message {
        MessageSnapshot::Content(content) if content.edit_date.is_some() => content,
        _ => {
            record(store, key, HistoryAction::Created, EntryPayload::created(message.clone()));
            register_media_from(store, message);
            return 1;
        }
    };

    let versions = synthesize_versions(&content.text, current_timestamp());
    debug!(%key, versions = versions.len(), "Reconstructing edit history");

    let mut previous_text: Option<&str> = None;
    for version in &versions {
        let mut snapshot = content.clone();
        snapshot.text = version.text.clone();

        match previous_text {
            None => {
                snapshot.edit_date = None;
                record_at(
                    store,
                    key,
                    HistoryAction::Created,
                    EntryPayload::created(MessageSnapshot::Content(snapshot)),
                    version.timestamp,
                );
            }
            Some(from) => {
                record_at(
                    store,
                    key,
                    HistoryAction::Edited,
                    EntryPayload::edited(
                        MessageSnapshot::Content(snapshot),
                        ChangeSet::text(from, version.text.as_str()),
                    ),
                    version.timestamp,
                );
            }
        }

        previous_text = Some(&version.text);
    }

    register_media_from(store, message);
    versions.len()
}
