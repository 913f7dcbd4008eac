//! Push-style subscriptions
//!
//! `SubscriptionHub` multiplexes any number of async callbacks per path
//! over a single watch on the underlying [`FileChanges`]. The first
//! subscriber to a path installs the watch and the last one to cancel
//! removes it. A failing or panicking subscriber is logged and skipped;
//! the remaining subscribers of the batch still run and the hub keeps
//! going.

use crate::changes::{FileChanges, Unwatch};
use crate::error::Result;
use crate::interest;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Async callback invoked with the changed path
pub type Callback = Arc<dyn Fn(PathBuf) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

struct PathSubscribers {
    unwatch: Unwatch,
    subscribers: Vec<(u64, Callback)>,
}

#[derive(Default)]
struct HubState {
    paths: HashMap<PathBuf, PathSubscribers>,
    next_id: u64,
}

/// Fan-out of coalesced changes to async subscribers
#[derive(Clone)]
pub struct SubscriptionHub {
    changes: FileChanges<PathBuf>,
    state: Arc<Mutex<HubState>>,
}

impl SubscriptionHub {
    /// Hub on the native backend with default settings
    pub fn new() -> Result<Self> {
        Ok(Self::with_changes(FileChanges::new()?))
    }

    /// Hub on an existing controller, which must not be watched elsewhere
    pub fn with_changes(changes: FileChanges<PathBuf>) -> Self {
        Self {
            changes,
            state: Arc::new(Mutex::new(HubState::default())),
        }
    }

    /// Call `callback` whenever `path` changes
    pub fn subscribe<F, Fut>(&self, path: impl AsRef<Path>, callback: F) -> Result<Subscription>
    where
        F: Fn(PathBuf) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (path, _) = interest::normalize(path.as_ref())?;
        let callback: Callback = Arc::new(move |changed| callback(changed).boxed());

        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;

        match state.paths.entry(path.clone()) {
            Entry::Occupied(mut entry) => entry.get_mut().subscribers.push((id, callback)),
            Entry::Vacant(entry) => {
                let unwatch = self.changes.watch(&path, path.clone())?;
                entry.insert(PathSubscribers {
                    unwatch,
                    subscribers: vec![(id, callback)],
                });
            }
        }
        debug!("Subscriber {} added for {}", id, path.display());

        Ok(Subscription {
            state: Arc::downgrade(&self.state),
            path,
            id,
            done: AtomicBool::new(false),
        })
    }

    /// Number of live subscribers for `path`
    pub fn subscriber_count(&self, path: impl AsRef<Path>) -> usize {
        let Ok((path, _)) = interest::normalize(path.as_ref()) else {
            return 0;
        };
        self.state
            .lock()
            .paths
            .get(&path)
            .map_or(0, |entry| entry.subscribers.len())
    }

    pub fn start(&self) -> Result<()> {
        self.changes.start()
    }

    /// Shut the underlying controller down; `run` returns soon after
    pub fn shutdown(&self) {
        self.changes.shutdown()
    }

    pub fn changes(&self) -> &FileChanges<PathBuf> {
        &self.changes
    }

    /// Deliver batches to subscribers until shutdown
    ///
    /// Subscribers of one path run in turn; each sees every batch that
    /// contains its path once.
    pub async fn run(&self) {
        let mut batches = Box::pin(self.changes.stream());

        while let Some(batch) = batches.next().await {
            for path in batch {
                let callbacks: Vec<Callback> = self
                    .state
                    .lock()
                    .paths
                    .get(&path)
                    .map(|entry| entry.subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                    .unwrap_or_default();

                for callback in callbacks {
                    // A callback may panic before handing back its future
                    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| callback(path.clone()))) {
                        Ok(delivery) => AssertUnwindSafe(delivery).catch_unwind().await,
                        Err(payload) => Err(payload),
                    };
                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!("Subscriber for {} failed: {:#}", path.display(), e),
                        Err(_) => error!("Subscriber for {} panicked", path.display()),
                    }
                }
            }
        }

        debug!("Subscription hub stopped");
    }
}

impl fmt::Debug for SubscriptionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHub")
            .field("paths", &self.state.lock().paths.len())
            .finish()
    }
}

/// Handle cancelling one subscriber
pub struct Subscription {
    state: Weak<Mutex<HubState>>,
    path: PathBuf,
    id: u64,
    done: AtomicBool,
}

impl Subscription {
    /// Remove this subscriber; the path's watch goes with the last one
    ///
    /// Repeated calls are no-ops.
    pub fn cancel(&self) -> Result<()> {
        if self.done.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let Some(state) = self.state.upgrade() else {
            return Ok(());
        };

        let mut state = state.lock();
        let Some(entry) = state.paths.get_mut(&self.path) else {
            return Ok(());
        };
        entry.subscribers.retain(|(id, _)| *id != self.id);
        if !entry.subscribers.is_empty() {
            return Ok(());
        }

        match state.paths.remove(&self.path) {
            Some(entry) => entry.unwatch.unwatch(),
            None => Ok(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
