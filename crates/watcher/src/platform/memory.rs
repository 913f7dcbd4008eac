//! In-memory backend
//!
//! Records directory watches instead of installing them and lets the
//! owner inject events synchronously. Used by the test suites and by
//! embedders that feed events from their own source.

use super::{DirWatch, EventSink, WatchBackend};
use crate::error::{Result, WatchError};
use crate::RawEvent;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Default)]
struct MemoryState {
    sink: Option<EventSink>,
    /// Active watches: id -> directory
    active: BTreeMap<u64, PathBuf>,
    installs: usize,
    next_id: u64,
    started: bool,
    stopped: bool,
    fail_next_install: bool,
}

/// Shared view of a [`MemoryBackend`]
#[derive(Clone, Default)]
pub struct MemoryHandle {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the backend half, wired to `sink`
    pub fn backend(&self, sink: EventSink) -> MemoryBackend {
        self.state.lock().sink = Some(sink);
        MemoryBackend {
            state: Arc::clone(&self.state),
        }
    }

    /// Deliver an event to the sink on the calling thread
    pub fn emit(&self, event: RawEvent) {
        let sink = self.state.lock().sink.clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }

    /// Directories currently watched, one entry per installed watch
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.state.lock().active.values().cloned().collect()
    }

    /// Total number of `install` calls that succeeded
    pub fn install_count(&self) -> usize {
        self.state.lock().installs
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Make the next `install` fail with an I/O error
    pub fn fail_next_install(&self) {
        self.state.lock().fail_next_install = true;
    }
}

/// Backend half handed to the controller
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl WatchBackend for MemoryBackend {
    fn install(&mut self, dir: &Path) -> Result<DirWatch> {
        let mut state = self.state.lock();
        if state.stopped {
            return Err(WatchError::ShutDown);
        }
        if std::mem::take(&mut state.fail_next_install) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "injected install failure").into());
        }

        state.next_id += 1;
        state.installs += 1;
        let id = state.next_id;
        state.active.insert(id, dir.to_path_buf());
        Ok(DirWatch::new(dir, id))
    }

    fn remove(&mut self, watch: DirWatch) -> Result<()> {
        self.state.lock().active.remove(&watch.id());
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.stopped {
            return Err(WatchError::ShutDown);
        }
        state.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.stopped = true;
        state.active.clear();
        Ok(())
    }
}
