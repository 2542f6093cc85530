//! Read-side result types: statistics and exports

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{EntityKey, HistoryEntry, MediaReference};

/// Aggregate counters over the whole store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    /// Keys with a non-empty log
    pub total_messages: usize,
    /// Keys with at least one `Edited` entry
    pub edited_messages: usize,
    pub deleted_messages: usize,
    pub stored_media_files: usize,
}

/// Owned copy of (part of) the store for external backup
///
/// Serialized shape: `messageHistory` and `deletedMessages` are objects
/// keyed by `"<conversationId>_<messageId>"`, `mediaFiles` is an array of
/// media records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryExport {
    #[serde(rename = "messageHistory")]
    pub logs: BTreeMap<EntityKey, Vec<HistoryEntry>>,
    #[serde(rename = "deletedMessages")]
    pub deletions: BTreeMap<EntityKey, HistoryEntry>,
    #[serde(rename = "mediaFiles")]
    pub media: Vec<MediaReference>,
}

impl HistoryExport {
    pub fn entry_count(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }
}
