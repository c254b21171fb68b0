//! Repository discovery abstraction layer
//!
//! The synchronizer only ever sees [`RepoSpec`]; where the list came from is
//! behind the [`Discovery`] trait.

use anyhow::Result;
use async_trait::async_trait;

use crate::GitHubClient;

/// Provider-agnostic repository descriptor
///
/// Supplied wholesale by a [`Discovery`] source and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSpec {
    /// Repository name (e.g., "gh-mirror")
    pub name: String,

    /// Owner login
    pub owner: String,

    /// URL passed to `git clone --mirror`
    pub clone_url: String,

    /// Free-text description, if the repository has one
    pub description: Option<String>,

    /// Whether the repository is a fork
    pub is_fork: bool,

    /// Whether the repository is private
    pub is_private: bool,
}

impl RepoSpec {
    /// Public, non-fork descriptor with just a clone URL
    pub fn new(name: impl Into<String>, clone_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: String::new(),
            clone_url: clone_url.into(),
            description: None,
            is_fork: false,
            is_private: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Get display name (owner/name format)
    pub fn full_name(&self) -> String {
        if self.owner.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.owner, self.name)
        }
    }
}

/// Trait for repository discovery from various providers
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Every repository that should be mirrored
    async fn discover(&self) -> Result<Vec<RepoSpec>>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

/// Public, non-fork repositories owned by one GitHub account
pub struct GitHubDiscovery {
    client: GitHubClient,
    user: String,
}

impl GitHubDiscovery {
    pub fn new(client: GitHubClient, user: impl Into<String>) -> Self {
        Self {
            client,
            user: user.into(),
        }
    }

    /// Convert octocrab Repository to our RepoSpec
    ///
    /// Prefers the HTTPS clone URL, then the git:// URL, then SSH.
    fn repo_to_spec(&self, repo: &octocrab::models::Repository) -> RepoSpec {
        let owner = repo
            .owner
            .as_ref()
            .map(|o| o.login.clone())
            .unwrap_or_else(|| self.user.clone());

        let clone_url = repo
            .clone_url
            .as_ref()
            .map(|u| u.to_string())
            .or_else(|| repo.git_url.as_ref().map(|u| u.to_string()))
            .or_else(|| repo.ssh_url.clone())
            .unwrap_or_else(|| format!("https://github.com/{}/{}.git", owner, repo.name));

        RepoSpec {
            name: repo.name.clone(),
            owner,
            clone_url,
            description: repo.description.clone(),
            is_fork: repo.fork.unwrap_or(false),
            is_private: repo.private.unwrap_or(false),
        }
    }
}

#[async_trait]
impl Discovery for GitHubDiscovery {
    async fn discover(&self) -> Result<Vec<RepoSpec>> {
        let repositories = self.client.list_public_repositories(&self.user).await?;

        Ok(repositories
            .iter()
            .map(|repo| self.repo_to_spec(repo))
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}
