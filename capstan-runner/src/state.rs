//! Tracking-file state store
//!
//! The tracking file is one JSON object mapping job ids to metadata written
//! by the external tool; only key presence matters here. The runner reads
//! it under a shared advisory lock and never writes it. Contention and
//! corruption are distinct failures so the deduplicator can retry one and
//! not the other.

use fs2::FileExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors from reading the tracking file
#[derive(Debug, Error)]
pub enum StateError {
    /// Another process holds an exclusive lock on the file
    #[error("tracking file is locked for writing")]
    Locked,

    /// The file exists but does not parse as a JSON object
    #[error("tracking file is corrupt: {0}")]
    Corrupt(String),

    /// Any other I/O failure
    #[error("failed to read tracking file: {0}")]
    Io(#[from] io::Error),
}

impl StateError {
    /// Check if this error is transient and worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Locked)
    }
}

/// Read access to the shared record of already-dispatched jobs
pub trait StateStore: Send + Sync {
    /// Returns the tracked job map; a missing file is an empty map
    fn read(&self) -> Result<HashMap<String, Value>, StateError>;
}

/// [`StateStore`] backed by an advisory-locked file on disk
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Creates a store for the tracking file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the tracking file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn read(&self) -> Result<HashMap<String, Value>, StateError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            // Bootstrap case: nothing has been dispatched yet.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(err.into()),
        };

        // Non-blocking shared lock: an external exclusive writer means
        // contention, never a wait.
        match FileExt::try_lock_shared(&file) {
            Ok(()) => {}
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                return Err(StateError::Locked);
            }
            Err(err) => return Err(err.into()),
        }

        let result = read_tracked(&mut file);

        // The lock is released on every exit path, parse failure included;
        // the descriptor closing right after makes a failure here harmless,
        // but it still gets logged.
        if let Err(err) = FileExt::unlock(&file) {
            warn!("Failed to release tracking file lock: {}", err);
        }

        result
    }
}

fn read_tracked(file: &mut File) -> Result<HashMap<String, Value>, StateError> {
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(|err| StateError::Corrupt(err.to_string()))
}
