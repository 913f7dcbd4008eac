//! Path interest table
//!
//! Maps each watched path to the payload handed back when it changes.
//! Duplicate registrations are rejected.

use crate::error::{Result, WatchError};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

struct Interest<T> {
    value: T,
    /// Registration token, so a stale handle can't remove a newer entry
    token: u64,
}

/// Watched path -> payload
pub struct InterestTable<T> {
    entries: HashMap<PathBuf, Interest<T>>,
}

impl<T> Default for InterestTable<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> InterestTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path`, failing if it is already present
    pub fn insert(&mut self, path: PathBuf, value: T, token: u64) -> Result<()> {
        if self.entries.contains_key(&path) {
            return Err(WatchError::DuplicateWatch(path));
        }
        self.entries.insert(path, Interest { value, token });
        Ok(())
    }

    /// Remove `path` if it is still registered under `token`
    pub fn remove(&mut self, path: &Path, token: u64) -> Option<T> {
        match self.entries.get(path) {
            Some(interest) if interest.token == token => {
                self.entries.remove(path).map(|interest| interest.value)
            }
            _ => None,
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&T> {
        self.entries.get(path).map(|interest| &interest.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> InterestTable<T> {
    /// Payloads for `paths`, silently skipping any no longer watched
    pub fn resolve<'a, I>(&self, paths: I) -> Vec<T>
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        paths
            .into_iter()
            .filter_map(|path| self.get(path).cloned())
            .collect()
    }
}

/// Normalize a path for use as an interest key
///
/// Relative paths are anchored at the current directory and `.`/`..` are
/// folded lexically. When the parent directory exists it is canonicalized,
/// so the key matches what the OS reports for symlinked directories.
/// Returns the normalized path and its parent directory.
pub fn normalize(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut folded = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                folded.pop();
            }
            other => folded.push(other.as_os_str()),
        }
    }

    let invalid = |reason| WatchError::InvalidPath {
        path: path.to_path_buf(),
        reason,
    };
    let name = folded.file_name().ok_or_else(|| invalid("no file name"))?.to_owned();
    let parent = folded.parent().ok_or_else(|| invalid("no parent directory"))?;
    let parent = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());

    Ok((parent.join(name), parent))
}
