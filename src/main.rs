use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gh_mirror::config::parse_duration;
use gh_mirror::{Config, Discovery, GitCommand, GitHubClient, GitHubDiscovery, SyncEngine, Synchronizer};

#[derive(Parser)]
#[command(name = "gh-mirror")]
#[command(about = "Mirror the public, non-fork GitHub repositories of an account")]
#[command(version)]
struct Cli {
    /// GitHub account whose repositories are mirrored
    #[arg(value_name = "USER")]
    user: String,

    /// Target directory [default: .]
    #[arg(short, long, value_name = "DIR")]
    dir: Option<String>,

    /// Per-repository timeout, e.g. 1m, 90s, 1m30s [default: 1m]
    #[arg(short, long, value_name = "DURATION", value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Maximum repositories synchronized at once [default: 8]
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GitHub token, raises API rate limits
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub API base URL (GitHub Enterprise)
    #[arg(long, env = "GH_MIRROR_API_URL")]
    api_url: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Nothing left to report to if the terminal is gone
            e.print().ok();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging based on verbosity level
///
/// Logs go to stderr; stdout belongs to git.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load configuration and apply command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    if let Some(dir) = &cli.dir {
        config.target_directory = dir.clone();
    }
    if let Some(jobs) = cli.jobs {
        config.sync.max_parallel = jobs;
    }
    if cli.token.is_some() {
        config.github.token = cli.token.clone();
    }
    if cli.api_url.is_some() {
        config.github.api_url = cli.api_url.clone();
    }

    Ok(config)
}

/// Returns whether every repository synchronized
async fn run(cli: Cli) -> Result<bool> {
    let config = load_config(&cli)?;

    let timeout = match cli.timeout {
        Some(timeout) => timeout,
        None => config.timeout_duration()?,
    };
    let target_dir = config.resolve_target_dir()?;

    let discovery = GitHubDiscovery::new(GitHubClient::new(&config)?, cli.user.as_str());
    info!("Listing repositories of {} on {}", cli.user, discovery.provider_name());
    let repos = discovery
        .discover()
        .await
        .context("failed to fetch repository list")?;

    // Mirrors of repositories that vanished upstream are left in place.
    let runner = Arc::new(GitCommand::new(&config.sync.git_binary));
    let engine = SyncEngine::new(
        Synchronizer::new(target_dir, runner),
        timeout,
        config.sync.max_parallel,
    );

    let summary = engine.sync_all(repos).await;
    summary.report_failures();

    Ok(summary.is_success())
}
