//! Watch backends
//!
//! A backend owns the OS-level watch service. It installs non-recursive
//! watches on directories and forwards every event it sees to an
//! [`EventSink`], on whatever thread it likes. Filtering and interest
//! lookup happen in the dispatcher, not here.

pub mod memory;
pub mod native;

pub use memory::{MemoryBackend, MemoryHandle};
pub use native::NativeBackend;

use crate::error::Result;
use crate::RawEvent;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Callback a backend delivers raw events to
pub type EventSink = Arc<dyn Fn(RawEvent) + Send + Sync>;

/// Handle for one installed directory watch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirWatch {
    dir: PathBuf,
    id: u64,
}

impl DirWatch {
    pub fn new(dir: impl Into<PathBuf>, id: u64) -> Self {
        Self { dir: dir.into(), id }
    }

    /// Directory this watch covers
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Backend-assigned identifier
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// OS watch service capability
///
/// Implementations must tolerate `remove` for a directory that has since
/// vanished, and `stop` being called once at most.
pub trait WatchBackend: Send {
    /// Install a non-recursive watch on `dir`
    fn install(&mut self, dir: &Path) -> Result<DirWatch>;

    /// Remove a watch previously returned by `install`
    fn remove(&mut self, watch: DirWatch) -> Result<()>;

    /// Begin delivering events
    fn start(&mut self) -> Result<()>;

    /// Stop the watch service
    fn stop(&mut self) -> Result<()>;
}
