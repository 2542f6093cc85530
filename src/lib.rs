//! Message History Engine
//!
//! An append-only change log for chat messages. Every observed message gets
//! an ordered sequence of lifecycle entries (creation, edits with field-level
//! diffs, deletion, media replacement) that can be queried, searched,
//! exported and persisted.
//!
//! # Features
//!
//! - **Append-only logs**: entries are never reordered or retracted
//! - **Field-level diffs**: text, formatting entities and media
//! - **Durable persistence**: atomic file writes, optionally on a background writer
//! - **Synthetic history**: plausible edit sequences for messages edited before tracking
//! - **Media registry**: content-addressed references with async materialization
//!
//! # Modules
//!
//! - `types`: Core data structures (EntityKey, MessageSnapshot, HistoryEntry)
//! - `diff`: Change detection between two snapshots
//! - `reconstruct`: Synthetic version sequences
//! - `media`: Media extraction and the `MediaFetcher` capability
//! - `store`: The change-log store, queries and persistence backends
//! - `intake`: Host notification processing
//! - `config`: Storage location configuration
//! - `error`: Error types
//! - `utils`: Utility functions (timestamps, atomic writes)
//!
//! # Example
//!
//! ```no_run
//! use message_history::{ChangeLogStore, EventIntake, HistoryConfig, RawNotification};
//!
//! let store = ChangeLogStore::open(&HistoryConfig::from_env());
//! let mut intake = EventIntake::new(store);
//!
//! let raw = RawNotification::new(
//!     "message_sent",
//!     serde_json::json!({"message": {"_": "message", "peerId": 1, "mid": 1, "date": 0, "message": "hi"}}),
//! );
//! intake.handle_raw(raw).ok();
//!
//! println!("{:?}", intake.store().stats());
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod intake;
pub mod media;
pub mod reconstruct;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::HistoryConfig;
pub use error::{FetchError, IntakeError, MediaExtractionError, PersistenceError};
pub use intake::{EventIntake, HostNotification, KeyState, RawNotification};
pub use media::{MediaFetcher, MetadataOnlyFetcher};
pub use store::{
    ChangeLogStore, FilePersistence, HistoryPersistence, MemoryPersistence, PersistedHistory,
    QueuedPersistence,
};
pub use types::{
    ChangeSet, ContentMessage, EntityKey, EntryPayload, HistoryAction, HistoryEntry,
    HistoryExport, HistoryStats, MediaKind, MediaReference, MessageMedia, MessageSnapshot,
    ServiceMessage,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
