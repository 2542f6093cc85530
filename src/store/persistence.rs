//! Persistence backends for the change-log store
//!
//! The store depends only on [`HistoryPersistence`]: load the last saved
//! document, save a new one. Three backends are provided:
//!
//! - [`FilePersistence`]: one JSON document, replaced atomically per save
//! - [`MemoryPersistence`]: shared in-memory slot, useful for tests and hosts
//!   that persist elsewhere
//! - [`QueuedPersistence`]: wraps another backend and performs saves on a
//!   background writer thread, in call order
//!
//! ```text
//! record() ──► serialize ──► save(doc) ──► [queue] ──► writer thread ──► inner.save(doc)
//!                                              FIFO: a crash loses at most the newest doc
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{PersistenceError, PersistenceResult};
use crate::types::{EntityKey, HistoryEntry, MediaReference};
use crate::utils::{atomic_write, cleanup_temp_files};

/// The single serialized document holding the whole store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedHistory {
    #[serde(default)]
    pub message_history: BTreeMap<EntityKey, Vec<HistoryEntry>>,
    #[serde(default)]
    pub deleted_messages: BTreeMap<EntityKey, HistoryEntry>,
    #[serde(default)]
    pub media_files: BTreeMap<String, MediaReference>,
}

impl PersistedHistory {
    pub fn to_json(&self) -> PersistenceResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(document: &str) -> PersistenceResult<Self> {
        serde_json::from_str(document).map_err(|e| PersistenceError::Corrupted(e.to_string()))
    }
}

/// Durable storage for the serialized history document
pub trait HistoryPersistence: Send {
    /// Load the last saved document, `None` if nothing was saved yet
    fn load(&self) -> PersistenceResult<Option<String>>;

    /// Replace the stored document
    fn save(&self, document: String) -> PersistenceResult<()>;

    /// Block until previously issued saves have completed
    fn flush(&self) -> PersistenceResult<()> {
        Ok(())
    }
}

/// Stores the document as a JSON file
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    /// Create a file backend, removing leftovers of interrupted writes
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();

        if let Some(dir) = path.parent() {
            match cleanup_temp_files(dir) {
                Ok(0) => {}
                Ok(n) => info!(dir = ?dir, removed = n, "Removed interrupted history writes"),
                Err(e) => warn!(dir = ?dir, error = %e, "Failed to clean up temp files"),
            }
        }

        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryPersistence for FilePersistence {
    fn load(&self) -> PersistenceResult<Option<String>> {
        if !self.path.exists() {
            debug!(path = ?self.path, "No history document, starting fresh");
            return Ok(None);
        }

        Ok(Some(fs::read_to_string(&self.path)?))
    }

    fn save(&self, document: String) -> PersistenceResult<()> {
        atomic_write(&self.path, document.as_bytes())?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemorySlot {
    document: Option<String>,
    saves: usize,
    fail_writes: bool,
}

/// In-memory backend; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    slot: Arc<Mutex<MemorySlot>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an already stored document
    pub fn with_document(document: impl Into<String>) -> Self {
        let backend = Self::new();
        backend.slot.lock().document = Some(document.into());
        backend
    }

    /// Currently stored document
    pub fn document(&self) -> Option<String> {
        self.slot.lock().document.clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.slot.lock().saves
    }

    /// Make subsequent saves fail as if storage were full
    pub fn set_failing(&self, failing: bool) {
        self.slot.lock().fail_writes = failing;
    }
}

impl HistoryPersistence for MemoryPersistence {
    fn load(&self) -> PersistenceResult<Option<String>> {
        Ok(self.slot.lock().document.clone())
    }

    fn save(&self, document: String) -> PersistenceResult<()> {
        let mut slot = self.slot.lock();
        if slot.fail_writes {
            return Err(PersistenceError::Unavailable("storage quota exceeded".to_string()));
        }
        slot.document = Some(document);
        slot.saves += 1;
        Ok(())
    }
}

enum WriteJob {
    Save(String),
    Flush(Sender<()>),
}

/// Performs saves of an inner backend on a background writer thread.
///
/// `save` only enqueues and returns immediately. Saves are executed in the
/// order they were issued; failures are logged by the writer.
pub struct QueuedPersistence {
    inner: Arc<Mutex<Box<dyn HistoryPersistence>>>,
    jobs: Option<Sender<WriteJob>>,
    writer: Option<JoinHandle<()>>,
}

impl QueuedPersistence {
    pub fn new<P: HistoryPersistence + 'static>(inner: P) -> Self {
        let inner: Arc<Mutex<Box<dyn HistoryPersistence>>> = Arc::new(Mutex::new(Box::new(inner)));
        let (jobs, queue) = mpsc::channel();

        let writer_inner = Arc::clone(&inner);
        let writer = thread::Builder::new()
            .name("history-writer".to_string())
            .spawn(move || run_writer(writer_inner, queue));

        match writer {
            Ok(handle) => Self {
                inner,
                jobs: Some(jobs),
                writer: Some(handle),
            },
            Err(e) => {
                // Degrade to inline writes
                error!(error = %e, "Failed to spawn history writer thread");
                Self {
                    inner,
                    jobs: None,
                    writer: None,
                }
            }
        }
    }
}

fn run_writer(inner: Arc<Mutex<Box<dyn HistoryPersistence>>>, queue: Receiver<WriteJob>) {
    for job in queue {
        match job {
            WriteJob::Save(document) => {
                if let Err(e) = inner.lock().save(document) {
                    error!(error = %e, "Failed to save history");
                }
            }
            WriteJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

impl HistoryPersistence for QueuedPersistence {
    fn load(&self) -> PersistenceResult<Option<String>> {
        self.flush()?;
        self.inner.lock().load()
    }

    fn save(&self, document: String) -> PersistenceResult<()> {
        match &self.jobs {
            Some(jobs) => jobs
                .send(WriteJob::Save(document))
                .map_err(|_| PersistenceError::Unavailable("history writer stopped".to_string())),
            None => self.inner.lock().save(document),
        }
    }

    fn flush(&self) -> PersistenceResult<()> {
        let jobs = match &self.jobs {
            Some(jobs) => jobs,
            None => return Ok(()),
        };

        let (done, wait) = mpsc::channel();
        jobs.send(WriteJob::Flush(done))
            .map_err(|_| PersistenceError::Unavailable("history writer stopped".to_string()))?;
        wait.recv()
            .map_err(|_| PersistenceError::Unavailable("history writer stopped".to_string()))
    }
}

impl Drop for QueuedPersistence {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain the queue and exit
        self.jobs.take();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                error!("History writer thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_persistence_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FilePersistence::new(temp_dir.path().join("history.json"));

        assert_eq!(backend.load().unwrap(), None);

        backend.save("{\"messageHistory\":{}}".to_string()).unwrap();
        assert_eq!(backend.load().unwrap().as_deref(), Some("{\"messageHistory\":{}}"));
    }

    #[test]
    fn test_file_persistence_removes_stale_temp() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("history.tmp"), "partial").unwrap();

        let _backend = FilePersistence::new(temp_dir.path().join("history.json"));
        assert!(!temp_dir.path().join("history.tmp").exists());
    }

    #[test]
    fn test_memory_persistence_failure_mode() {
        let backend = MemoryPersistence::new();
        backend.save("a".to_string()).unwrap();

        backend.set_failing(true);
        assert!(matches!(
            backend.save("b".to_string()),
            Err(PersistenceError::Unavailable(_))
        ));
        assert_eq!(backend.document().as_deref(), Some("a"));
        assert_eq!(backend.save_count(), 1);
    }

    #[test]
    fn test_queued_persistence_keeps_order() {
        let memory = MemoryPersistence::new();
        let queued = QueuedPersistence::new(memory.clone());

        for i in 0..50 {
            queued.save(format!("doc-{}", i)).unwrap();
        }
        queued.flush().unwrap();

        assert_eq!(memory.save_count(), 50);
        assert_eq!(memory.document().as_deref(), Some("doc-49"));
    }

    #[test]
    fn test_queued_persistence_drains_on_drop() {
        let memory = MemoryPersistence::new();
        {
            let queued = QueuedPersistence::new(memory.clone());
            queued.save("last".to_string()).unwrap();
        }
        assert_eq!(memory.document().as_deref(), Some("last"));
    }

    #[test]
    fn test_corrupted_document() {
        assert!(matches!(
            PersistedHistory::from_json("{not json"),
            Err(PersistenceError::Corrupted(_))
        ));
    }
}
