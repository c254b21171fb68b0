use anyhow::{Context, Result};
use octocrab::models::Repository;
use octocrab::{Octocrab, Page};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;

/// Repositories requested per page, the API maximum
const PER_PAGE: u8 = 100;

/// GitHub client wrapper
pub struct GitHubClient {
    client: Octocrab,
}

/// Query parameters for `GET /users/{user}/repos`
#[derive(Serialize)]
struct ListReposParams {
    #[serde(rename = "type")]
    repo_type: &'static str,
    per_page: u8,
}

impl GitHubClient {
    /// Create a client from configuration
    ///
    /// Requests are anonymous unless a token is configured.
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Octocrab::builder();

        if let Some(api_url) = &config.github.api_url {
            debug!("Using GitHub API at {}", api_url);
            builder = builder
                .base_uri(api_url.as_str())
                .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;
        }

        if let Some(token) = config.github.token.as_ref().filter(|t| !t.is_empty()) {
            debug!("Using token authentication");
            builder = builder.personal_token(token.clone());
        }

        let client = builder.build().context("Failed to create GitHub client")?;

        Ok(Self { client })
    }

    /// Wrap an existing octocrab client
    pub fn with_client(client: Octocrab) -> Self {
        Self { client }
    }

    /// List the public, non-fork repositories owned by `user`
    ///
    /// Follows pagination until the API reports no next page. Any page
    /// failure aborts the whole listing.
    pub async fn list_public_repositories(&self, user: &str) -> Result<Vec<Repository>> {
        debug!("Fetching repositories for: {}", user);

        let params = ListReposParams {
            repo_type: "owner",
            per_page: PER_PAGE,
        };

        let mut page_number = 1u32;
        let mut page: Page<Repository> = self
            .client
            .get(format!("/users/{}/repos", user), Some(&params))
            .await
            .with_context(|| format!("Failed to fetch repositories page {}", page_number))?;

        let mut repositories = Vec::new();
        loop {
            repositories.extend(page.items.into_iter().filter(is_mirrorable));

            page_number += 1;
            page = match self
                .client
                .get_page::<Repository>(&page.next)
                .await
                .with_context(|| format!("Failed to fetch repositories page {}", page_number))?
            {
                Some(next) => next,
                None => break,
            };
        }

        info!("Found {} public repositories for {}", repositories.len(), user);
        Ok(repositories)
    }
}

/// Forks and private repositories are never mirrored
fn is_mirrorable(repo: &Repository) -> bool {
    if repo.fork == Some(true) {
        debug!("Excluding fork repository: {}", repo.name);
        return false;
    }
    if repo.private == Some(true) {
        debug!("Excluding private repository: {}", repo.name);
        return false;
    }
    true
}
