//! Event coalescing
//!
//! Editors typically produce several raw events per logical save (write,
//! rename, metadata touch). The coalescer waits for the first queued
//! change, sleeps a fixed window so the rest of the burst can land, then
//! drains whatever has arrived into one de-duplicated set. The window is
//! never extended, so latency stays bounded however busy the queue is.

use crate::dispatch::{run_hook, Hook};
use crate::Pending;
use crossbeam_channel::Receiver;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Result of one coalescing step
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Drained {
    /// Unique changed paths
    pub paths: BTreeSet<PathBuf>,
    /// Sentinel seen (or queue disconnected); no further steps should run
    pub shutdown: bool,
}

/// Blocking drain half of the change queue
pub struct Coalescer {
    queue: Receiver<Pending>,
    window: Duration,
    on_idle: Option<Hook>,
}

impl Coalescer {
    pub fn new(queue: Receiver<Pending>, window: Duration, on_idle: Option<Hook>) -> Self {
        Self {
            queue,
            window,
            on_idle,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Block for the next burst of changes
    ///
    /// Returns immediately with `shutdown` set and no paths when the
    /// sentinel is the first item. A sentinel found while draining is
    /// reported alongside the paths collected before it.
    pub fn next_burst(&self) -> Drained {
        if let Some(hook) = &self.on_idle {
            run_hook(hook, "on_idle");
        }

        let mut drained = Drained::default();
        match self.queue.recv() {
            Ok(Pending::Changed(path)) => {
                drained.paths.insert(path);
            }
            // A disconnected queue can never produce again
            Ok(Pending::Shutdown) | Err(_) => {
                drained.shutdown = true;
                return drained;
            }
        }

        thread::sleep(self.window);

        for pending in self.queue.try_iter() {
            match pending {
                Pending::Changed(path) => {
                    drained.paths.insert(path);
                }
                Pending::Shutdown => drained.shutdown = true,
            }
        }

        trace!(
            "Coalesced {} path(s), shutdown={}",
            drained.paths.len(),
            drained.shutdown
        );
        drained
    }
}
