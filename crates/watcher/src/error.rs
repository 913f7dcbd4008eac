//! Error types for file change watching

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported synchronously to callers of `FileChanges`
#[derive(Debug, Error)]
pub enum WatchError {
    /// Path already has a registered interest
    #[error("{} is already being watched", .0.display())]
    DuplicateWatch(PathBuf),

    /// Path cannot be watched (e.g. it has no parent directory)
    #[error("cannot watch {}: {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: &'static str },

    /// Controller has been shut down
    #[error("file watcher has been shut down")]
    ShutDown,

    /// Underlying OS watch service failed
    #[error("watch backend error: {0}")]
    Backend(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for watch operations
pub type Result<T> = std::result::Result<T, WatchError>;
