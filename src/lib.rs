//! gh-mirror - Mirror GitHub Repositories as Bare Repositories
//!
//! gh-mirror lists every public, non-fork repository owned by an account and
//! keeps a bare mirror of each one in a target directory, cloning new
//! repositories and updating existing ones on every run.
//!
//! ## Modules
//!
//! - [`config`]: Configuration file, durations and target directory resolution
//! - [`github`]: GitHub API listing
//! - [`discovery`]: Provider-agnostic repository descriptors
//! - [`git`]: Process runner for the git executable
//! - [`mirror`]: Per-repository clone-or-update and sidecar files
//! - [`sync`]: Bounded parallel fan-out with per-repository deadlines

pub mod config;
pub mod discovery;
pub mod git;
pub mod github;
pub mod mirror;
pub mod sync;

pub use config::Config;
pub use discovery::{Discovery, GitHubDiscovery, RepoSpec};
pub use git::{GitCommand, GitRunner};
pub use github::GitHubClient;
pub use mirror::{SyncAction, Synchronizer};
pub use sync::{SyncEngine, SyncFailure, SyncSummary};
