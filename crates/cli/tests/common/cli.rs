//! Helpers for running the `pathwatch` binary
//!
//! One-shot invocations go through [`PathwatchCommand::execute`];
//! long-running watches are spawned and their stdout read line by line.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

/// CLI command builder
pub struct PathwatchCommand {
    working_dir: PathBuf,
    args: Vec<String>,
}

impl PathwatchCommand {
    /// Create a new command in the given working directory
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_pathwatch"));
        command.args(&self.args).current_dir(&self.working_dir);
        command
    }

    /// Run to completion
    pub fn execute(&self) -> Result<CommandResult> {
        let output = self
            .command()
            .output()
            .context("Failed to execute pathwatch")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    /// Start a long-running watch
    pub fn spawn(&self) -> Result<RunningWatch> {
        let mut child = self
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to spawn pathwatch")?;

        let stdout = child.stdout.take().context("No stdout handle")?;
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Ok(RunningWatch { child, lines: rx })
    }
}

/// Command execution result
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A spawned `pathwatch` process, killed on drop
pub struct RunningWatch {
    child: Child,
    lines: Receiver<String>,
}

impl RunningWatch {
    /// Wait for a stdout line containing `needle`
    pub fn wait_for_line(&self, needle: &str, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = self
                .lines
                .recv_timeout(remaining)
                .with_context(|| format!("Timed out waiting for {:?}", needle))?;
            if line.contains(needle) {
                return Ok(line);
            }
        }
    }

    /// Count stdout lines containing `needle` that arrive within `window`
    pub fn count_lines(&self, needle: &str, window: Duration) -> usize {
        let deadline = Instant::now() + window;
        let mut count = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(remaining) {
                Ok(line) if line.contains(needle) => count += 1,
                Ok(_) => {}
                Err(_) => return count,
            }
        }
    }
}

impl Drop for RunningWatch {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
