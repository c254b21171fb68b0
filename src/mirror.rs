//! Per-repository mirror synchronization
//!
//! A repository is cloned with `git clone --mirror` the first time and
//! refreshed with `git remote update` afterwards. The presence of its
//! directory is the only record of which case applies.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::discovery::RepoSpec;
use crate::git::GitRunner;

/// Sidecar holding the repository description, read by gitweb and cgit
pub const DESCRIPTION_FILE: &str = "description";

/// Zero-byte marker allowing git-daemon to serve the repository
pub const EXPORT_OK_FILE: &str = "git-daemon-export-ok";

/// What a successful sync did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// First sync: the mirror was cloned
    Cloned { path: PathBuf },
    /// The existing mirror was updated from its remote
    Updated { path: PathBuf },
}

impl SyncAction {
    pub fn path(&self) -> &Path {
        match self {
            SyncAction::Cloned { path } | SyncAction::Updated { path } => path,
        }
    }
}

/// Last path segment of a clone URL, used as the mirror directory name
///
/// Trailing slashes are ignored. Nothing is validated: an empty result
/// degrades to "." like a path basename would.
pub fn mirror_dir_name(clone_url: &str) -> &str {
    let trimmed = clone_url.trim_end_matches('/');
    match trimmed.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => ".",
    }
}

/// Synchronizes repositories into a target directory
pub struct Synchronizer {
    target_dir: PathBuf,
    runner: Arc<dyn GitRunner>,
}

impl Synchronizer {
    pub fn new(target_dir: impl Into<PathBuf>, runner: Arc<dyn GitRunner>) -> Self {
        Self {
            target_dir: target_dir.into(),
            runner,
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Local mirror directory for `repo`
    pub fn repo_dir(&self, repo: &RepoSpec) -> PathBuf {
        self.target_dir.join(mirror_dir_name(&repo.clone_url))
    }

    /// Clone or update `repo`, then refresh its sidecar files
    ///
    /// Fails if the mirror directory cannot be inspected or if git fails.
    /// Sidecar write failures are only logged.
    pub async fn sync(&self, repo: &RepoSpec, deadline: Instant) -> Result<SyncAction> {
        let repo_dir = self.repo_dir(repo);

        let action = match tokio::fs::metadata(&repo_dir).await {
            Ok(_) => {
                info!("Updating repository: {} at {}", repo.clone_url, repo_dir.display());
                self.run_git(&update_args(&repo_dir), deadline)
                    .await
                    .with_context(|| format!("failed to update repository {:?}", repo.clone_url))?;
                SyncAction::Updated { path: repo_dir }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Cloning repository: {} -> {}", repo.clone_url, repo_dir.display());
                self.run_git(&clone_args(&repo.clone_url, &repo_dir), deadline)
                    .await
                    .with_context(|| format!("failed to clone repository {:?}", repo.clone_url))?;
                SyncAction::Cloned { path: repo_dir }
            }
            Err(e) => bail!(
                "failed to stat {:?} for repository {:?}: {}",
                repo_dir,
                repo.clone_url,
                e
            ),
        };

        write_sidecars(action.path(), repo.description.as_deref()).await;

        debug!("Synchronized {}: {:?}", repo.clone_url, action);
        Ok(action)
    }

    /// Only git runs under the deadline; sidecar writes do not
    async fn run_git(&self, args: &[OsString], deadline: Instant) -> Result<()> {
        match timeout_at(deadline, self.runner.run(args, deadline)).await {
            Ok(result) => result,
            Err(_) => bail!("timed out"),
        }
    }
}

fn clone_args(clone_url: &str, repo_dir: &Path) -> Vec<OsString> {
    vec![
        "clone".into(),
        "--mirror".into(),
        clone_url.into(),
        repo_dir.as_os_str().to_owned(),
    ]
}

fn update_args(repo_dir: &Path) -> Vec<OsString> {
    vec![
        "--git-dir".into(),
        repo_dir.as_os_str().to_owned(),
        "remote".into(),
        "update".into(),
    ]
}

async fn write_sidecars(repo_dir: &Path, description: Option<&str>) {
    let description = format!("{}\n", description.unwrap_or_default());
    if let Err(e) = tokio::fs::write(repo_dir.join(DESCRIPTION_FILE), description).await {
        warn!("Failed to write description for {:?}: {}", repo_dir, e);
    }

    if let Err(e) = tokio::fs::write(repo_dir.join(EXPORT_OK_FILE), b"").await {
        warn!("Failed to write export file for {:?}: {}", repo_dir, e);
    }
}
