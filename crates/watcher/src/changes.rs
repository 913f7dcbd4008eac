//! File change controller
//!
//! `FileChanges<T>` owns the change queue, the interest table, the
//! directory registry and the backend. Callers register paths with
//! [`FileChanges::watch`], start the backend, and then consume coalesced
//! batches of payloads either by iterating [`FileChanges::fetch`] on a
//! thread of their choosing or by polling [`FileChanges::stream`] from
//! async code.
//!
//! Lifecycle: created -> started -> shut down (terminal). Watches may be
//! added before `start`; events are only dispatched while started.

use crate::coalesce::Coalescer;
use crate::dispatch::{Dispatcher, Hook};
use crate::error::{Result, WatchError};
use crate::interest::{self, InterestTable};
use crate::platform::{EventSink, NativeBackend, WatchBackend};
use crate::registry::DirectoryRegistry;
use crate::Pending;
use crossbeam_channel::{unbounded, Sender};
use futures::stream::{self, Stream};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Coalescing window used unless the builder overrides it
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Started,
    ShutDown,
}

/// State mutated by watch/unwatch/start/shutdown, never by the dispatcher
struct Control {
    registry: DirectoryRegistry,
    lifecycle: Lifecycle,
}

struct Inner<T> {
    /// Shared with the dispatcher, which only ever takes the read lock
    interest: Arc<RwLock<InterestTable<T>>>,
    control: Mutex<Control>,
    /// Dispatcher gate
    active: Arc<AtomicBool>,
    queue: Sender<Pending>,
    coalescer: Coalescer,
    /// Sentinel consumed; the batch sequence is over for good
    terminated: AtomicBool,
    next_token: AtomicU64,
}

impl<T: Clone> Inner<T> {
    /// Block for the next non-empty batch, `None` once shut down
    fn next_batch(&self) -> Option<Vec<T>> {
        loop {
            if self.terminated.load(Ordering::Acquire) {
                return None;
            }

            let drained = self.coalescer.next_burst();
            if drained.shutdown {
                self.terminated.store(true, Ordering::Release);
                // Pass the sentinel on to any other consumer blocked in recv
                let _ = self.queue.send(Pending::Shutdown);
            }

            let batch = self.interest.read().resolve(&drained.paths);
            if !batch.is_empty() {
                debug!(
                    "Yielding batch of {} from {} changed path(s)",
                    batch.len(),
                    drained.paths.len()
                );
                return Some(batch);
            }
        }
    }
}

/// Type-erased removal, so `Unwatch` needn't carry the payload type
trait Unregister: Send + Sync {
    fn unregister(&self, path: &Path, parent: &Path, token: u64) -> Result<()>;
}

impl<T: Send + Sync> Unregister for Inner<T> {
    fn unregister(&self, path: &Path, parent: &Path, token: u64) -> Result<()> {
        let mut control = self.control.lock();
        if self.interest.write().remove(path, token).is_none() {
            return Ok(());
        }
        debug!("Unwatched {}", path.display());
        control.registry.release(parent, token)
    }
}

/// Watches a dynamic set of files, yielding payloads in coalesced batches
pub struct FileChanges<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for FileChanges<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for FileChanges<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileChanges")
            .field("watched", &self.inner.interest.read().len())
            .field("window", &self.inner.coalescer.window())
            .finish()
    }
}

impl<T: Send + Sync + 'static> FileChanges<T> {
    /// Controller on the native backend with default settings
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> FileChangesBuilder<T> {
        FileChangesBuilder::default()
    }

    /// Watch `path`, yielding `value` whenever it changes
    ///
    /// The parent directory's watch is installed immediately if this is
    /// the first path under it. Fails with `DuplicateWatch` if `path` is
    /// already watched and with `ShutDown` after [`FileChanges::shutdown`].
    pub fn watch(&self, path: impl AsRef<Path>, value: T) -> Result<Unwatch> {
        let (path, parent) = interest::normalize(path.as_ref())?;
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);

        let mut control = self.inner.control.lock();
        if control.lifecycle == Lifecycle::ShutDown {
            return Err(WatchError::ShutDown);
        }

        self.inner.interest.write().insert(path.clone(), value, token)?;
        if let Err(e) = control.registry.acquire(&parent, token) {
            self.inner.interest.write().remove(&path, token);
            return Err(e);
        }
        drop(control);

        debug!("Watching {}", path.display());
        let inner: Arc<dyn Unregister> = self.inner.clone();
        Ok(Unwatch {
            target: Arc::downgrade(&inner),
            path,
            parent,
            token,
            done: AtomicBool::new(false),
        })
    }

    /// Start the backend; events are dispatched from now on
    pub fn start(&self) -> Result<()> {
        let mut control = self.inner.control.lock();
        match control.lifecycle {
            Lifecycle::Started => Ok(()),
            Lifecycle::ShutDown => Err(WatchError::ShutDown),
            Lifecycle::Created => {
                control.registry.backend_mut().start()?;
                self.inner.active.store(true, Ordering::Release);
                control.lifecycle = Lifecycle::Started;
                info!("File watcher started");
                Ok(())
            }
        }
    }

    /// Stop the backend and wake the consumer with the shutdown sentinel
    ///
    /// Safe to call from any thread, any number of times.
    pub fn shutdown(&self) {
        let mut control = self.inner.control.lock();
        if control.lifecycle == Lifecycle::ShutDown {
            return;
        }
        control.lifecycle = Lifecycle::ShutDown;
        self.inner.active.store(false, Ordering::Release);

        if let Err(e) = control.registry.backend_mut().stop() {
            warn!("Failed to stop watch backend: {}", e);
        }
        // The controller holds a receiver, so this can't fail
        let _ = self.inner.queue.send(Pending::Shutdown);
        info!("File watcher shut down");
    }

    /// Whether `path` currently has a registered interest
    pub fn is_watching(&self, path: impl AsRef<Path>) -> bool {
        match interest::normalize(path.as_ref()) {
            Ok((path, _)) => self.inner.interest.read().contains(&path),
            Err(_) => false,
        }
    }

    /// Number of watched paths
    pub fn watched_count(&self) -> usize {
        self.inner.interest.read().len()
    }

    /// Number of directories with an installed OS watch
    pub fn watched_dir_count(&self) -> usize {
        self.inner.control.lock().registry.len()
    }

    pub fn coalesce_window(&self) -> Duration {
        self.inner.coalescer.window()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.control.lock().lifecycle == Lifecycle::ShutDown
    }
}

impl<T: Clone + Send + Sync + 'static> FileChanges<T> {
    /// Blocking iterator over batches of payloads
    ///
    /// Each step blocks the calling thread until a change arrives. The
    /// sequence ends after `shutdown` and cannot be restarted.
    pub fn fetch(&self) -> Batches<T> {
        Batches {
            changes: self.clone(),
        }
    }

    /// Async stream over batches of payloads
    ///
    /// Every step runs the blocking drain on tokio's blocking pool, so the
    /// polling task never blocks its executor. Must be polled from inside a
    /// tokio runtime.
    pub fn stream(&self) -> impl Stream<Item = Vec<T>> + Send + 'static {
        stream::unfold(Arc::clone(&self.inner), |inner| async move {
            let worker = Arc::clone(&inner);
            match tokio::task::spawn_blocking(move || worker.next_batch()).await {
                Ok(Some(batch)) => Some((batch, inner)),
                Ok(None) => None,
                Err(e) => {
                    error!("Coalescing worker failed: {}", e);
                    None
                }
            }
        })
    }
}

/// Blocking iterator returned by [`FileChanges::fetch`]
pub struct Batches<T> {
    changes: FileChanges<T>,
}

impl<T: Clone> Iterator for Batches<T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Vec<T>> {
        self.changes.inner.next_batch()
    }
}

/// Handle removing one registration
///
/// Calling [`Unwatch::unwatch`] more than once is harmless. Dropping the
/// handle does not unwatch. If the controller is gone the call is a no-op.
pub struct Unwatch {
    target: Weak<dyn Unregister>,
    path: PathBuf,
    parent: PathBuf,
    token: u64,
    done: AtomicBool,
}

impl Unwatch {
    /// Remove the registration and, if it was the last under its parent
    /// directory, the directory's OS watch
    pub fn unwatch(&self) -> Result<()> {
        if self.done.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.target.upgrade() {
            Some(target) => target.unregister(&self.path, &self.parent, self.token),
            None => Ok(()),
        }
    }

    /// Normalized path this handle removes
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for Unwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unwatch")
            .field("path", &self.path)
            .field("done", &self.done.load(Ordering::Relaxed))
            .finish()
    }
}

/// Construction-time configuration for [`FileChanges`]
pub struct FileChangesBuilder<T> {
    window: Duration,
    on_idle: Option<Hook>,
    on_value: Option<Hook>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Default for FileChangesBuilder<T> {
    fn default() -> Self {
        Self {
            window: DEFAULT_COALESCE_WINDOW,
            on_idle: None,
            on_value: None,
            _payload: PhantomData,
        }
    }
}

impl<T: Send + Sync + 'static> FileChangesBuilder<T> {
    /// Delay after the first change of a burst before draining the queue
    pub fn coalesce_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Called on the consumer's thread before each blocking wait
    pub fn on_idle(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_idle = Some(Arc::new(hook));
        self
    }

    /// Called on the backend's thread when a watched path changes, before
    /// the change is queued. Meant for interrupting an unrelated event loop
    /// the consumer may be blocked in.
    pub fn on_value(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_value = Some(Arc::new(hook));
        self
    }

    /// Build on the native OS backend
    pub fn build(self) -> Result<FileChanges<T>> {
        self.build_with(NativeBackend::new)
    }

    /// Build on a custom backend, created from the dispatcher's event sink
    pub fn build_with<B, F>(self, make_backend: F) -> Result<FileChanges<T>>
    where
        B: WatchBackend + 'static,
        F: FnOnce(EventSink) -> Result<B>,
    {
        let (tx, rx) = unbounded();
        let interest = Arc::new(RwLock::new(InterestTable::new()));
        let active = Arc::new(AtomicBool::new(false));

        let dispatcher = Dispatcher::new(
            Arc::clone(&interest),
            tx.clone(),
            Arc::clone(&active),
            self.on_value,
        );
        let sink: EventSink = Arc::new(move |event| dispatcher.dispatch(event));
        let backend = make_backend(sink)?;

        Ok(FileChanges {
            inner: Arc::new(Inner {
                interest,
                control: Mutex::new(Control {
                    registry: DirectoryRegistry::new(Box::new(backend)),
                    lifecycle: Lifecycle::Created,
                }),
                active,
                queue: tx,
                coalescer: Coalescer::new(rx, self.window, self.on_idle),
                terminated: AtomicBool::new(false),
                next_token: AtomicU64::new(1),
            }),
        })
    }
}
