use anyhow::{anyhow, bail, Context, Result};
use dirs::config_dir;
use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for gh-mirror
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Directory that receives one bare mirror per repository
    #[serde(default = "default_target_directory")]
    pub target_directory: String,

    /// GitHub API settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct GitHubConfig {
    /// API base URL (GitHub Enterprise, test servers); api.github.com if unset
    pub api_url: Option<String>,

    /// Personal access token; requests are anonymous if unset
    pub token: Option<String>,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Per-repository timeout, e.g. "1m", "90s", "1m30s"
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Maximum repositories synchronized at once
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Version-control executable, looked up on PATH
    #[serde(default = "default_git_binary")]
    pub git_binary: String,
}

fn default_target_directory() -> String {
    ".".to_string()
}
fn default_timeout() -> String {
    "1m".to_string()
}
fn default_max_parallel() -> usize {
    8
}
fn default_git_binary() -> String {
    "git".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_parallel: default_max_parallel(),
            git_binary: default_git_binary(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_directory: default_target_directory(),
            github: GitHubConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    ///
    /// Unlike `load`, a missing file is not an error and nothing is written.
    pub fn load_or_default() -> Result<Self> {
        match Self::default_config_path() {
            Ok(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("gh-mirror").join("config.yml"))
    }

    /// Expand `~` and environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.target_directory = shellexpand::full(&self.target_directory)
            .context("Failed to expand target_directory path")?
            .into_owned();

        Ok(())
    }

    /// Per-repository timeout as a `Duration`
    pub fn timeout_duration(&self) -> Result<Duration> {
        parse_duration(&self.sync.timeout)
            .with_context(|| format!("Invalid sync.timeout {:?}", self.sync.timeout))
    }

    /// Resolve `target_directory` to an absolute, existing directory
    pub fn resolve_target_dir(&self) -> Result<PathBuf> {
        resolve_target_dir(&self.target_directory)
    }
}

/// Make `dir` absolute and clean, then check that it is an existing directory
///
/// `dir` is taken literally; config file values are expanded once at load.
pub fn resolve_target_dir(dir: &str) -> Result<PathBuf> {
    let path = Path::new(dir);

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .with_context(|| format!("error resolving absolute path to {:?}", dir))?
            .join(path)
    };
    let absolute = absolute.clean();

    let metadata = std::fs::metadata(&absolute)
        .with_context(|| format!("could not stat {:?}", absolute))?;
    if !metadata.is_dir() {
        bail!("{:?} is not a directory", absolute);
    }

    Ok(absolute)
}

/// Parse a duration such as "1m", "90s", "1m30s", "500ms" or "2h"
///
/// A bare integer is read as seconds. Zero durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        bail!("empty duration");
    }

    if let Ok(secs) = input.parse::<u64>() {
        return non_zero(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = input.as_str();
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| anyhow!("missing unit in duration {:?}", input))?;
        if digits == 0 {
            bail!("invalid duration {:?}", input);
        }
        let value: u64 = rest[..digits]
            .parse()
            .with_context(|| format!("invalid number in duration {:?}", input))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let overflow = || anyhow!("duration {:?} overflows", input);
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60).ok_or_else(overflow)?),
            "h" => Duration::from_secs(value.checked_mul(3600).ok_or_else(overflow)?),
            "d" => Duration::from_secs(value.checked_mul(86400).ok_or_else(overflow)?),
            unit => bail!("unknown unit {:?} in duration {:?}", unit, input),
        };
        total = total.checked_add(part).ok_or_else(overflow)?;
        rest = &rest[unit_len..];
    }

    non_zero(total)
}

fn non_zero(duration: Duration) -> Result<Duration> {
    if duration.is_zero() {
        bail!("duration must be greater than zero");
    }
    Ok(duration)
}
