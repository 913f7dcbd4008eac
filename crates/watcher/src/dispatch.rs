//! Event dispatcher
//!
//! Runs on the backend's event thread. Filters raw events down to
//! modifications and renames onto watched paths and queues them for the
//! coalescing consumer.

use crate::interest::InterestTable;
use crate::{EventKind, Pending, RawEvent};
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Caller-supplied callback (`on_idle`, `on_value`)
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Run a hook, logging instead of unwinding if it panics
pub(crate) fn run_hook(hook: &Hook, name: &str) {
    if panic::catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
        error!("{} hook panicked", name);
    }
}

pub(crate) struct Dispatcher<T> {
    interest: Arc<RwLock<InterestTable<T>>>,
    queue: Sender<Pending>,
    /// Set between start and shutdown
    active: Arc<AtomicBool>,
    on_value: Option<Hook>,
}

impl<T> Dispatcher<T> {
    pub(crate) fn new(
        interest: Arc<RwLock<InterestTable<T>>>,
        queue: Sender<Pending>,
        active: Arc<AtomicBool>,
        on_value: Option<Hook>,
    ) -> Self {
        Self {
            interest,
            queue,
            active,
            on_value,
        }
    }

    /// Handle one raw event from the backend
    pub(crate) fn dispatch(&self, event: RawEvent) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        match event.kind {
            EventKind::Modified | EventKind::MovedTo => {}
            EventKind::Other => return,
        }

        // Read lock is released before any callback runs
        if !self.interest.read().contains(&event.path) {
            trace!("Ignoring event for unwatched {}", event.path.display());
            return;
        }

        if let Some(hook) = &self.on_value {
            run_hook(hook, "on_value");
        }

        if self.queue.send(Pending::Changed(event.path)).is_err() {
            debug!("Change queue closed, dropping event");
        }
    }
}
