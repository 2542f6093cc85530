//! Data types for the message history engine
//!
//! This module contains all the core data structures used throughout the crate.

mod entry;
mod key;
mod media;
mod message;
mod stats;

pub use entry::{
    ChangeSet, DeletionMeta, EntryId, EntryPayload, FieldChange, HistoryAction, HistoryEntry,
};
pub use key::EntityKey;
pub use media::{MediaKind, MediaReference};
pub use message::{
    ContentMessage, Document, DocumentAttribute, MessageMedia, MessageSnapshot, Photo, PhotoSize,
    ServiceMessage, TextEntity, DOCUMENT_TAG, PHOTO_TAG,
};
pub use stats::{HistoryExport, HistoryStats};
