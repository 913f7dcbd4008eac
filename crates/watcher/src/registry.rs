//! Directory subscription registry
//!
//! One backend watch per distinct parent directory, kept alive while at
//! least one registration token references it.

use crate::error::Result;
use crate::platform::{DirWatch, WatchBackend};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A directory with an installed backend watch
struct WatchedDirectory {
    watch: DirWatch,
    /// Registration tokens of watched paths under this directory
    members: HashSet<u64>,
}

/// Directory registry, owning the backend it installs watches with
pub struct DirectoryRegistry {
    backend: Box<dyn WatchBackend>,
    dirs: HashMap<PathBuf, WatchedDirectory>,
}

impl DirectoryRegistry {
    pub fn new(backend: Box<dyn WatchBackend>) -> Self {
        Self {
            backend,
            dirs: HashMap::new(),
        }
    }

    /// Record `token` under `dir`, installing a watch if it's the first
    ///
    /// Nothing is recorded if the install fails.
    pub fn acquire(&mut self, dir: &Path, token: u64) -> Result<()> {
        if let Some(watched) = self.dirs.get_mut(dir) {
            watched.members.insert(token);
            return Ok(());
        }

        let watch = self.backend.install(dir)?;
        debug!("Installed watch on {} for token {}", dir.display(), token);
        self.dirs.insert(
            dir.to_path_buf(),
            WatchedDirectory {
                watch,
                members: HashSet::from([token]),
            },
        );
        Ok(())
    }

    /// Drop `token` from `dir`, removing the watch when no members remain
    ///
    /// Releasing a token that isn't recorded is a no-op. The record is
    /// evicted before the backend is asked to remove the watch, so a
    /// backend failure leaves the registry consistent.
    pub fn release(&mut self, dir: &Path, token: u64) -> Result<()> {
        let Some(watched) = self.dirs.get_mut(dir) else {
            return Ok(());
        };
        if !watched.members.remove(&token) || !watched.members.is_empty() {
            return Ok(());
        }

        if let Some(watched) = self.dirs.remove(dir) {
            debug!("Last interest under {} gone, removing watch", dir.display());
            self.backend.remove(watched.watch)?;
        }
        Ok(())
    }

    /// Whether `dir` currently has a watch installed
    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.contains_key(dir)
    }

    /// Number of registrations under `dir`
    pub fn member_count(&self, dir: &Path) -> usize {
        self.dirs.get(dir).map_or(0, |w| w.members.len())
    }

    /// Number of directories with an installed watch
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn backend_mut(&mut self) -> &mut dyn WatchBackend {
        self.backend.as_mut()
    }
}
