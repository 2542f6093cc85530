//! Configuration for the change-log store

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "MESSAGE_HISTORY_DIR";

/// Environment variable overriding the document file name
pub const FILE_NAME_ENV: &str = "MESSAGE_HISTORY_FILE";

/// Configuration for the ChangeLogStore
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Directory holding the history document
    pub data_dir: PathBuf,
    /// File name of the history document inside `data_dir`
    pub file_name: String,
    /// Hand writes to a background writer instead of writing inline
    pub queued_writes: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            file_name: "message_history.json".to_string(),
            queued_writes: true,
        }
    }
}

impl HistoryConfig {
    /// Create config with custom data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Build config from `MESSAGE_HISTORY_DIR` / `MESSAGE_HISTORY_FILE`.
    ///
    /// A relative directory is resolved against the current directory.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        if let Ok(dir) = env::var(DATA_DIR_ENV) {
            let dir = PathBuf::from(dir);
            config.data_dir = if dir.is_absolute() {
                dir
            } else {
                current_dir.join(dir)
            };
        }

        if let Ok(file_name) = env::var(FILE_NAME_ENV) {
            if !file_name.trim().is_empty() {
                config.file_name = file_name;
            }
        }

        config
    }

    /// Set the document file name
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Write inline on the calling thread
    pub fn inline_writes(mut self) -> Self {
        self.queued_writes = false;
        self
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get path to the history document
    pub fn document_path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }
}
