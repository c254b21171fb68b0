//! Process runner for the git executable
//!
//! Git's own output is passed straight through to our stdout and stderr; only
//! the exit status is interpreted.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command as AsyncCommand;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

/// Runs version-control commands on behalf of the synchronizer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run git with `args`, failing on a non-zero exit or once `deadline` passes
    async fn run(&self, args: &[OsString], deadline: Instant) -> Result<()>;
}

/// Invokes the git executable as a subprocess
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: PathBuf,
}

impl GitCommand {
    /// Run `program` (looked up on PATH) instead of `git`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitCommand {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl GitRunner for GitCommand {
    async fn run(&self, args: &[OsString], deadline: Instant) -> Result<()> {
        let command_line = display_args(args);
        debug!("Running {} {}", self.program.display(), command_line);

        let mut child = AsyncCommand::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to execute {}", self.program.display()))?;

        let status = match timeout_at(deadline, child.wait()).await {
            Ok(status) => status.with_context(|| {
                format!("Failed to wait for {}", self.program.display())
            })?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {} {}: {}", self.program.display(), command_line, e);
                }
                bail!("{} {} timed out", self.program.display(), command_line);
            }
        };

        if !status.success() {
            bail!("{} {} failed: {}", self.program.display(), command_line, status);
        }

        Ok(())
    }
}

fn display_args(args: &[OsString]) -> String {
    args.iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
