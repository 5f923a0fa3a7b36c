//! Persistence boundary for the task collection.
//!
//! Defines the [`TaskPersistence`] trait used by the store to read the
//! collection once at startup and to rewrite it after every mutation, plus
//! two implementations:
//! - [`JsonFile`] -- the whole collection as one pretty-printed JSON file
//! - [`MemoryPersistence`] -- in-memory snapshot, for tests and embedding

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use smarttask_proto::codec::{self, CodecError};
use smarttask_proto::task::Task;

/// Errors raised at the persistence boundary.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The data file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The data file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// File that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The stored document is not a valid task collection.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Decoder error.
        source: CodecError,
    },

    /// The collection could not be serialized.
    #[error("failed to encode tasks: {0}")]
    Encode(CodecError),

    /// The backend refused the write.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Whole-collection storage used by the task store.
///
/// Both operations are blocking and act on the entire collection.
pub trait TaskPersistence: Send + Sync {
    /// Reads the stored collection.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if stored data exists but cannot be read.
    fn load(&self) -> Result<Option<Vec<Task>>, PersistenceError>;

    /// Replaces the stored collection with `tasks`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the collection cannot be written.
    fn save(&self, tasks: &[Task]) -> Result<(), PersistenceError>;

    /// Moves unreadable stored data out of the way so that a fresh
    /// collection can be saved without destroying it.
    ///
    /// Returns where the old data now lives, or `None` when there was
    /// nothing to move.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the data could not be moved.
    fn set_aside(&self) -> Result<Option<PathBuf>, PersistenceError> {
        Ok(None)
    }
}

impl<P: TaskPersistence + ?Sized> TaskPersistence for Arc<P> {
    fn load(&self) -> Result<Option<Vec<Task>>, PersistenceError> {
        (**self).load()
    }

    fn save(&self, tasks: &[Task]) -> Result<(), PersistenceError> {
        (**self).save(tasks)
    }

    fn set_aside(&self) -> Result<Option<PathBuf>, PersistenceError> {
        (**self).set_aside()
    }
}

/// Stores the collection as a pretty-printed JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    /// Creates a handle for the given file path. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path with `suffix` appended to the file name.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn write_err(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl TaskPersistence for JsonFile {
    fn load(&self) -> Result<Option<Vec<Task>>, PersistenceError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        codec::decode(&text)
            .map(Some)
            .map_err(|source| PersistenceError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, tasks: &[Task]) -> Result<(), PersistenceError> {
        let text = codec::encode(tasks).map_err(PersistenceError::Encode)?;

        // Write to a sibling temp file and rename over the target.
        let tmp = self.sibling(".tmp");
        let written = fs::write(&tmp, text).and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&tmp)
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %tmp.display(), error = %cleanup, "failed to remove temp file");
            }
            return Err(self.write_err(e));
        }
        Ok(())
    }

    fn set_aside(&self) -> Result<Option<PathBuf>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let backup = self.sibling(".corrupt");
        fs::rename(&self.path, &backup).map_err(|e| self.write_err(e))?;
        Ok(Some(backup))
    }
}

/// In-memory implementation of [`TaskPersistence`].
///
/// Keeps the last saved snapshot and counts writes. Writes can be switched
/// to fail with [`set_fail_writes`](Self::set_fail_writes). Nothing survives
/// the process.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    snapshot: Mutex<Option<Vec<Task>>>,
    saves: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryPersistence {
    /// Creates an empty backend (the store will seed sample tasks).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that already holds `tasks`.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            snapshot: Mutex::new(Some(tasks)),
            ..Self::default()
        }
    }

    /// Returns the last saved collection.
    #[must_use]
    pub fn snapshot(&self) -> Option<Vec<Task>> {
        self.snapshot.lock().clone()
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Makes every subsequent save fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl TaskPersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<Vec<Task>>, PersistenceError> {
        Ok(self.snapshot.lock().clone())
    }

    fn save(&self, tasks: &[Task]) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "writes disabled".to_string(),
            ));
        }
        *self.snapshot.lock() = Some(tasks.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
