//! Configuration loading
//!
//! Settings come from an optional TOML file, with command-line flags
//! taking precedence:
//!
//! ```toml
//! paths = ["src/main.py", "notes.md"]
//!
//! [watch]
//! window_ms = 10
//! changed_only = true
//!
//! [exec]
//! command = "make preview"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Valid range for `watch.window_ms`
const WINDOW_MS_RANGE: std::ops::RangeInclusive<u64> = 1..=10_000;

/// On-disk configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub paths: Vec<PathBuf>,
    pub watch: WatchConfig,
    pub exec: ExecConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Coalescing window in milliseconds
    pub window_ms: u64,
    /// Skip files whose content digest didn't change
    pub changed_only: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            window_ms: pathevents::DEFAULT_COALESCE_WINDOW.as_millis() as u64,
            changed_only: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecConfig {
    /// Shell command run after each batch
    pub command: Option<String>,
}

impl FileConfig {
    /// Load and validate a config file
    ///
    /// Relative `paths` are taken relative to the file's own directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;

        if let Some(base) = path.parent() {
            for entry in &mut config.paths {
                if entry.is_relative() {
                    *entry = base.join(&*entry);
                }
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_window(self.watch.window_ms)
    }
}

fn validate_window(window_ms: u64) -> Result<()> {
    if !WINDOW_MS_RANGE.contains(&window_ms) {
        anyhow::bail!(
            "window_ms must be between {} and {} (got {})",
            WINDOW_MS_RANGE.start(),
            WINDOW_MS_RANGE.end(),
            window_ms
        );
    }
    Ok(())
}

/// Values given on the command line
#[derive(Debug, Default)]
pub struct Overrides {
    pub paths: Vec<PathBuf>,
    pub exec: Option<String>,
    pub window_ms: Option<u64>,
    pub changed_only: bool,
}

/// Effective settings for a run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub paths: Vec<PathBuf>,
    pub window: Duration,
    pub command: Option<String>,
    pub changed_only: bool,
}

impl Settings {
    /// Merge the config file (if any) with command-line overrides
    ///
    /// Paths from both sources are watched; every other flag replaces the
    /// file's value.
    pub fn resolve(config_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file = match config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let mut paths = file.paths;
        for path in overrides.paths {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            anyhow::bail!("No files to watch (pass paths or set `paths` in the config file)");
        }

        let window_ms = overrides.window_ms.unwrap_or(file.watch.window_ms);
        validate_window(window_ms)?;

        Ok(Self {
            paths,
            window: Duration::from_millis(window_ms),
            command: overrides.exec.or(file.exec.command),
            changed_only: overrides.changed_only || file.watch.changed_only,
        })
    }
}
