//! Media references tracked across snapshots

use std::fmt;

use serde::{Deserialize, Serialize};

use super::EntityKey;

/// Kind of media object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Document,
    Video,
    Audio,
    Voice,
    VideoNote,
    Sticker,
    Gif,
    Animation,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Photo => "photo",
            MediaKind::Document => "document",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Voice => "voice",
            MediaKind::VideoNote => "video_note",
            MediaKind::Sticker => "sticker",
            MediaKind::Gif => "gif",
            MediaKind::Animation => "animation",
        };
        f.write_str(name)
    }
}

/// Metadata for one distinct media object
///
/// Keyed by a content-derived id (`photo_<id>` / `doc_<id>`), so the same
/// file forwarded into several messages collapses to one record. `key`
/// points at the message it was most recently seen on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaReference {
    pub id: String,
    pub key: EntityKey,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_at: Option<i64>,
    /// Whether the bytes have been fetched into local storage
    #[serde(default, rename = "isStored")]
    pub materialized: bool,
}

impl MediaReference {
    pub fn new(id: impl Into<String>, key: EntityKey, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            key,
            kind,
            size: 0,
            mime_type: None,
            filename: None,
            local_url: None,
            downloaded_at: None,
            materialized: false,
        }
    }

    /// Merge a re-registration into this record.
    ///
    /// Metadata is last-write-wins; materialization state never regresses.
    pub(crate) fn merge_from(&mut self, incoming: MediaReference) {
        let was_materialized = self.materialized;
        let local_url = self.local_url.take();
        let downloaded_at = self.downloaded_at.take();

        *self = incoming;

        if was_materialized {
            self.materialized = true;
            self.local_url = self.local_url.take().or(local_url);
            self.downloaded_at = self.downloaded_at.or(downloaded_at);
        }
    }
}
