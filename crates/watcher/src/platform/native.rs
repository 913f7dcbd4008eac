//! Backend on top of `notify`'s recommended watcher
//!
//! inotify on Linux, FSEvents on macOS, ReadDirectoryChangesW on Windows.

use super::{DirWatch, EventSink, WatchBackend};
use crate::error::{Result, WatchError};
use crate::RawEvent;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tracing::{debug, warn};

/// Native OS watch service
pub struct NativeBackend {
    /// `None` once stopped
    watcher: Option<RecommendedWatcher>,
    next_id: u64,
}

impl NativeBackend {
    /// Create the OS watcher, forwarding translated events to `sink`
    pub fn new(sink: EventSink) -> Result<Self> {
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for raw in translate(event) {
                    sink(raw);
                }
            }
            Err(e) => warn!("File watch error: {}", e),
        })?;

        Ok(Self {
            watcher: Some(watcher),
            next_id: 0,
        })
    }
}

impl WatchBackend for NativeBackend {
    fn install(&mut self, dir: &Path) -> Result<DirWatch> {
        let watcher = self.watcher.as_mut().ok_or(WatchError::ShutDown)?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        self.next_id += 1;
        debug!("Watching directory {}", dir.display());
        Ok(DirWatch::new(dir, self.next_id))
    }

    fn remove(&mut self, watch: DirWatch) -> Result<()> {
        // Stopping already tore down every watch
        let Some(watcher) = self.watcher.as_mut() else {
            return Ok(());
        };

        debug!("Unwatching directory {}", watch.dir().display());
        watcher.unwatch(watch.dir())?;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        // notify delivers events from construction; the dispatcher gates on
        // the controller's state instead
        match self.watcher {
            Some(_) => Ok(()),
            None => Err(WatchError::ShutDown),
        }
    }

    fn stop(&mut self) -> Result<()> {
        // Dropping the watcher shuts its event thread down
        self.watcher.take();
        Ok(())
    }
}

/// Map a notify event onto zero or more raw events
fn translate(event: Event) -> Vec<RawEvent> {
    let Event { kind, paths, .. } = event;

    match kind {
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            paths.into_iter().map(RawEvent::modified).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.into_iter().map(RawEvent::moved_to).collect()
        }
        // paths = [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            paths.into_iter().nth(1).map(RawEvent::moved_to).into_iter().collect()
        }
        // FSEvents can't tell the two sides of a rename apart
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => paths
            .into_iter()
            .map(|path| {
                if path.exists() {
                    RawEvent::moved_to(path)
                } else {
                    RawEvent::other(path)
                }
            })
            .collect(),
        _ => paths.into_iter().map(RawEvent::other).collect(),
    }
}
