//! History entries
//!
//! A history entry is an immutable record of one lifecycle event of a
//! message. Entries are appended to the per-message log and never mutated.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{EntityKey, MessageSnapshot, TextEntity};

/// Lifecycle events that can be recorded for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    /// The message was first observed
    Created,
    /// The message text, formatting or media changed
    Edited,
    /// The message was deleted
    Deleted,
    /// The attached media was replaced
    MediaUpdated,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryAction::Created => write!(f, "created"),
            HistoryAction::Edited => write!(f, "edited"),
            HistoryAction::Deleted => write!(f, "deleted"),
            HistoryAction::MediaUpdated => write!(f, "media_updated"),
        }
    }
}

/// Globally unique entry id: `"<timestamp>_<random>"`
///
/// The time component keeps ids roughly creation-ordered; the random
/// component breaks ties between entries created in the same second.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn generate(timestamp: i64) -> Self {
        let nonce: u64 = rand::rng().random();
        Self(format!("{}_{}", timestamp, nonce))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Before/after pair for one changed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange<T> {
    pub from: T,
    pub to: T,
}

impl<T> FieldChange<T> {
    pub fn new(from: T, to: T) -> Self {
        Self { from, to }
    }
}

/// Field-level diff between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<FieldChange<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<FieldChange<Vec<TextEntity>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Raw host media payloads
    pub media: Option<FieldChange<Option<serde_json::Value>>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.entities.is_none() && self.media.is_none()
    }

    /// Change set holding only a text change
    pub fn text(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            text: Some(FieldChange::new(from.into(), to.into())),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionMeta {
    /// Deleted for everyone rather than only locally
    pub is_revoked: bool,
}

/// Optional parts of an entry supplied by the caller of `record`
#[derive(Debug, Clone, Default)]
pub struct EntryPayload {
    pub snapshot_before: Option<MessageSnapshot>,
    pub snapshot_after: Option<MessageSnapshot>,
    pub changes: Option<ChangeSet>,
    pub deletion: Option<DeletionMeta>,
}

impl EntryPayload {
    /// Payload for a `Created` entry
    pub fn created(message: MessageSnapshot) -> Self {
        Self {
            snapshot_before: Some(message),
            ..Default::default()
        }
    }

    /// Payload for an `Edited` or `MediaUpdated` entry
    pub fn edited(message: MessageSnapshot, changes: ChangeSet) -> Self {
        Self {
            snapshot_after: Some(message),
            changes: Some(changes),
            ..Default::default()
        }
    }

    /// Payload for a `Deleted` entry
    pub fn deleted(last_known: Option<MessageSnapshot>, is_revoked: bool) -> Self {
        Self {
            snapshot_before: last_known,
            deletion: Some(DeletionMeta { is_revoked }),
            ..Default::default()
        }
    }
}

/// One immutable record in a message's change log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: EntryId,
    pub key: EntityKey,
    pub action: HistoryAction,
    /// Unix timestamp (seconds)
    pub timestamp: i64,
    #[serde(default, rename = "originalMessage", skip_serializing_if = "Option::is_none")]
    pub snapshot_before: Option<MessageSnapshot>,
    #[serde(default, rename = "editedMessage", skip_serializing_if = "Option::is_none")]
    pub snapshot_after: Option<MessageSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<ChangeSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion: Option<DeletionMeta>,
}

impl HistoryEntry {
    pub fn new(key: EntityKey, action: HistoryAction, timestamp: i64, payload: EntryPayload) -> Self {
        Self {
            id: EntryId::generate(timestamp),
            key,
            action,
            timestamp,
            snapshot_before: payload.snapshot_before,
            snapshot_after: payload.snapshot_after,
            changes: payload.changes,
            deletion: payload.deletion,
        }
    }

    /// The snapshot that best describes the message after this event
    pub fn latest_snapshot(&self) -> Option<&MessageSnapshot> {
        self.snapshot_after.as_ref().or(self.snapshot_before.as_ref())
    }

    pub fn is_revoked(&self) -> bool {
        self.deletion.map(|d| d.is_revoked).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentMessage;

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_string(&HistoryAction::MediaUpdated).unwrap();
        assert_eq!(json, "\"media_updated\"");

        let parsed: HistoryAction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, HistoryAction::MediaUpdated);
    }

    #[test]
    fn test_entry_id_has_time_component() {
        let a = EntryId::generate(1700000000);
        let b = EntryId::generate(1700000000);

        assert!(a.as_str().starts_with("1700000000_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_latest_snapshot_prefers_after() {
        let before = MessageSnapshot::Content(ContentMessage::new(1, 1, 0, "old"));
        let after = MessageSnapshot::Content(ContentMessage::new(1, 1, 0, "new"));

        let mut entry = HistoryEntry::new(
            EntityKey::new(1, 1),
            HistoryAction::Edited,
            10,
            EntryPayload::edited(after, ChangeSet::text("old", "new")),
        );
        assert_eq!(entry.latest_snapshot().and_then(|s| s.text()), Some("new"));

        entry.snapshot_after = None;
        entry.snapshot_before = Some(before);
        assert_eq!(entry.latest_snapshot().and_then(|s| s.text()), Some("old"));
    }

    #[test]
    fn test_entry_json_field_names() {
        let entry = HistoryEntry::new(
            EntityKey::new(-5, 3),
            HistoryAction::Deleted,
            42,
            EntryPayload::deleted(None, true),
        );

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"key\":\"-5_3\""));
        assert!(json.contains("\"action\":\"deleted\""));
        assert!(json.contains("\"isRevoked\":true"));
        assert!(!json.contains("originalMessage"));
        assert!(entry.is_revoked());
    }
}
