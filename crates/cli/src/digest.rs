//! Content digests for `--changed-only`
//!
//! Editors often touch a file without changing it (save with no edits,
//! metadata rewrites). Remembering a blake3 digest per file lets the
//! driver drop those from a batch.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Last seen digest per file
#[derive(Default)]
pub struct DigestCache {
    digests: HashMap<PathBuf, blake3::Hash>,
}

impl DigestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record current digests without reporting anything
    pub fn prime<'a>(&mut self, paths: impl IntoIterator<Item = &'a PathBuf>) {
        for path in paths {
            if let Ok(hash) = digest_file(path) {
                self.digests.insert(path.clone(), hash);
            }
        }
    }

    /// Whether `path`'s content differs from the last time it was seen
    ///
    /// Unreadable files (mid-rename, deleted) count as unchanged; the next
    /// event for them will try again.
    pub fn changed(&mut self, path: &Path) -> bool {
        match digest_file(path) {
            Ok(hash) => self.digests.insert(path.to_path_buf(), hash) != Some(hash),
            Err(e) => {
                debug!("Skipping unreadable {}: {}", path.display(), e);
                false
            }
        }
    }
}

fn digest_file(path: &Path) -> io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    let mut file = File::open(path)?;
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize())
}
