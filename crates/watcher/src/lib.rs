//! File change notifications for Pathevents
//!
//! This crate watches a dynamic set of individual files and reports
//! changes to them in coalesced batches:
//! - One OS-level watch per parent directory, shared by every file under it
//! - Bursts of raw events folded into a single batch per coalescing window
//! - Blocking pull (`FileChanges::fetch`) and async pull (`FileChanges::stream`)
//! - Push-style subscriptions with per-subscriber failure isolation
//!
//! ```no_run
//! use pathevents::FileChanges;
//!
//! let changes = FileChanges::<&'static str>::builder().build()?;
//! let _unwatch = changes.watch("notes.md", "notes")?;
//! changes.start()?;
//!
//! for batch in changes.fetch() {
//!     println!("changed: {:?}", batch);
//! }
//! # Ok::<(), pathevents::WatchError>(())
//! ```

pub mod changes;
pub mod coalesce;
pub mod dispatch;
pub mod error;
pub mod interest;
pub mod platform;
pub mod registry;
pub mod subscribe;

pub use changes::{Batches, FileChanges, FileChangesBuilder, Unwatch, DEFAULT_COALESCE_WINDOW};
pub use dispatch::Hook;
pub use error::{Result, WatchError};
pub use platform::{DirWatch, EventSink, WatchBackend};
pub use subscribe::{Subscription, SubscriptionHub};

use std::path::PathBuf;

/// Raw file system event, as normalized by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Path the event resolved to (destination for renames)
    pub path: PathBuf,
    /// Type of change
    pub kind: EventKind,
}

impl RawEvent {
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: EventKind::Modified,
        }
    }

    pub fn moved_to(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: EventKind::MovedTo,
        }
    }

    pub fn other(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: EventKind::Other,
        }
    }
}

/// Type of file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// File content modified
    Modified,
    /// File renamed onto `path`
    MovedTo,
    /// Anything else (create, delete, move-away, metadata). Never dispatched.
    Other,
}

/// Queue item passed from the dispatcher to the coalescing consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    /// A watched path changed
    Changed(PathBuf),
    /// Shutdown sentinel
    Shutdown,
}
