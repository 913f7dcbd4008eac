//! Watch loop
//!
//! Two ways to drive the same reload logic: the blocking batch iterator
//! on a worker thread, or the async batch stream. Either way the command
//! runs once per coalesced batch.

use crate::config::Settings;
use crate::digest::DigestCache;
use anyhow::{Context, Result};
use futures::StreamExt;
use owo_colors::OwoColorize;
use pathevents::FileChanges;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tracing::{info, warn};

/// Environment variable listing the changed files, one per line
const CHANGED_ENV: &str = "PATHWATCH_CHANGED";

/// Reaction to a batch of changed files
struct Reloader {
    command: Option<String>,
    digests: Option<DigestCache>,
}

impl Reloader {
    fn new(settings: &Settings) -> Self {
        let digests = settings.changed_only.then(|| {
            let mut cache = DigestCache::new();
            cache.prime(&settings.paths);
            cache
        });
        Self {
            command: settings.command.clone(),
            digests,
        }
    }

    fn handle(&mut self, mut batch: Vec<PathBuf>) {
        if let Some(digests) = self.digests.as_mut() {
            batch.retain(|path| digests.changed(path));
        }
        if batch.is_empty() {
            return;
        }
        batch.sort();

        for path in &batch {
            println!("{} {}", "changed".cyan(), path.display());
        }

        if let Some(command) = &self.command {
            if let Err(e) = run_command(command, &batch) {
                eprintln!("{} {:#}", "error:".red(), e);
            }
        }
    }
}

/// Run `command` through the shell with the changed files in the environment
fn run_command(command: &str, changed: &[PathBuf]) -> Result<()> {
    let listing = changed
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n");

    let mut shell = if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C");
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c");
        cmd
    };

    let status = shell
        .arg(command)
        .env(CHANGED_ENV, listing)
        .status()
        .with_context(|| format!("Failed to run `{}`", command))?;

    if !status.success() {
        warn!("`{}` exited with {}", command, status);
    }
    Ok(())
}

fn announce(settings: &Settings) {
    println!(
        "{} {} file(s), window {:?}",
        "watching".green(),
        settings.paths.len(),
        settings.window
    );
}

/// Shut `shutdown` down on Ctrl-C
fn shutdown_on_ctrl_c(shutdown: impl FnOnce() + Send + 'static) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            shutdown();
        }
    });
}

/// Blocking iterator on the blocking pool, one reload per batch
pub async fn run_blocking(settings: Settings) -> Result<()> {
    let changes = FileChanges::<PathBuf>::builder()
        .coalesce_window(settings.window)
        .on_idle(|| {
            let _ = std::io::stdout().flush();
        })
        .build()
        .context("Failed to create file watcher")?;

    for path in &settings.paths {
        changes
            .watch(path, path.clone())
            .with_context(|| format!("Failed to watch {}", path.display()))?;
    }
    changes.start()?;
    announce(&settings);

    shutdown_on_ctrl_c({
        let changes = changes.clone();
        move || changes.shutdown()
    });

    let mut reloader = Reloader::new(&settings);
    tokio::task::spawn_blocking(move || {
        for batch in changes.fetch() {
            reloader.handle(batch);
        }
    })
    .await
    .context("Watch loop failed")?;

    Ok(())
}

/// Async batch stream, one reload per batch
///
/// The reloader hops onto the blocking pool for each batch, since the
/// command may block for a while.
pub async fn run_async(settings: Settings) -> Result<()> {
    let changes = FileChanges::<PathBuf>::builder()
        .coalesce_window(settings.window)
        .build()
        .context("Failed to create file watcher")?;

    let mut unwatches = Vec::with_capacity(settings.paths.len());
    for path in &settings.paths {
        let unwatch = changes
            .watch(path, path.clone())
            .with_context(|| format!("Failed to watch {}", path.display()))?;
        unwatches.push(unwatch);
    }
    changes.start()?;
    announce(&settings);

    shutdown_on_ctrl_c({
        let changes = changes.clone();
        move || changes.shutdown()
    });

    let mut reloader = Reloader::new(&settings);
    let mut batches = Box::pin(changes.stream());
    while let Some(batch) = batches.next().await {
        reloader = tokio::task::spawn_blocking(move || {
            reloader.handle(batch);
            reloader
        })
        .await
        .context("Reload task failed")?;
    }

    for unwatch in unwatches {
        if let Err(e) = unwatch.unwatch() {
            warn!("Failed to unwatch {}: {}", unwatch.path().display(), e);
        }
    }
    Ok(())
}
