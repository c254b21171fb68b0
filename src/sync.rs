//! Sync Engine - Orchestrates parallel repository synchronization
//!
//! Every repository gets its own task and its own deadline. A failing or
//! timed-out repository is recorded and never stops the others.

use crate::discovery::RepoSpec;
use crate::mirror::{SyncAction, Synchronizer};
use anyhow::anyhow;
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// A repository that could not be synchronized
#[derive(Debug)]
pub struct SyncFailure {
    pub clone_url: String,
    pub error: anyhow::Error,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

/// Results from a complete sync operation
#[derive(Debug)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub cloned: usize,
    pub updated: usize,
    /// In completion order
    pub failures: Vec<SyncFailure>,
    pub duration: Duration,
}

impl SyncSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Log every failure, one line each
    pub fn report_failures(&self) {
        if self.failures.is_empty() {
            return;
        }

        error!("The following errors occurred:");
        for failure in &self.failures {
            error!("- {}", failure);
        }
    }
}

/// The fan-out coordinator: one task per repository
#[derive(Clone)]
pub struct SyncEngine {
    synchronizer: Arc<Synchronizer>,
    timeout: Duration,
    max_parallel: usize,
}

impl SyncEngine {
    /// `max_parallel` is clamped to at least 1
    pub fn new(synchronizer: Synchronizer, timeout: Duration, max_parallel: usize) -> Self {
        Self {
            synchronizer: Arc::new(synchronizer),
            timeout,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Synchronize every repository and wait for all of them
    pub async fn sync_all(&self, repositories: Vec<RepoSpec>) -> SyncSummary {
        let start_time = Instant::now();
        let total_repositories = repositories.len();

        info!(
            "Syncing {} repositories into {} (max {} at once, timeout {:?})",
            total_repositories,
            self.synchronizer.target_dir().display(),
            self.max_parallel,
            self.timeout
        );

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut tasks = FuturesUnordered::new();

        for repo in repositories {
            let clone_url = repo.clone_url.clone();
            let handle = tokio::spawn(Self::sync_one(
                self.synchronizer.clone(),
                semaphore.clone(),
                self.timeout,
                repo,
            ));
            tasks.push(async move { (clone_url, handle.await) });
        }

        let mut summary = SyncSummary {
            total_repositories,
            cloned: 0,
            updated: 0,
            failures: Vec::new(),
            duration: Duration::ZERO,
        };

        while let Some((clone_url, joined)) = tasks.next().await {
            let result = joined
                .map_err(|e| anyhow!("sync task for {:?} panicked: {}", clone_url, e))
                .and_then(|result| result);

            match result {
                Ok(action) => {
                    debug!("Sync completed: {:?}", action);
                    match action {
                        SyncAction::Cloned { .. } => summary.cloned += 1,
                        SyncAction::Updated { .. } => summary.updated += 1,
                    }
                }
                Err(error) => {
                    debug!("Sync failed for {}: {:#}", clone_url, error);
                    summary.failures.push(SyncFailure { clone_url, error });
                }
            }
        }

        summary.duration = start_time.elapsed();

        info!(
            "Sync completed in {:.2}s: {} cloned, {} updated, {} failed",
            summary.duration.as_secs_f64(),
            summary.cloned,
            summary.updated,
            summary.failures.len()
        );

        summary
    }

    /// The deadline starts once a permit is held, not when the task is queued
    async fn sync_one(
        synchronizer: Arc<Synchronizer>,
        semaphore: Arc<Semaphore>,
        timeout: Duration,
        repo: RepoSpec,
    ) -> anyhow::Result<SyncAction> {
        let _permit = semaphore
            .acquire_owned()
            .await
            .map_err(|_| anyhow!("sync of {:?} cancelled", repo.clone_url))?;

        synchronizer.sync(&repo, deadline_after(timeout)).await
    }
}

/// `timeout` from now, saturating at a deadline decades away
fn deadline_after(timeout: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}
