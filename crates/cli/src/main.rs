//! pathwatch - react to changes in a set of files

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

mod config;
mod digest;
mod driver;

use config::{Overrides, Settings};

/// Watch files and report (or act on) each coalesced batch of changes
#[derive(Parser)]
#[command(name = "pathwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Files to watch
    paths: Vec<PathBuf>,

    /// Shell command to run after each batch of changes
    #[arg(short = 'x', long)]
    exec: Option<String>,

    /// Coalescing window in milliseconds (default: 10)
    #[arg(long)]
    window_ms: Option<u64>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip files whose content is unchanged since the last batch
    #[arg(long)]
    changed_only: bool,

    /// Consume batches from the async stream instead of a blocking thread
    #[arg(long = "async")]
    use_async: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::resolve(
        cli.config.as_deref(),
        Overrides {
            paths: cli.paths,
            exec: cli.exec,
            window_ms: cli.window_ms,
            changed_only: cli.changed_only,
        },
    )?;

    if cli.use_async {
        driver::run_async(settings).await
    } else {
        driver::run_blocking(settings).await
    }
}
