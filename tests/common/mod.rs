//! Common test utilities and helpers for gh-mirror tests

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use gh_mirror::{GitRunner, RepoSpec};
use serde_json::{json, Value};
use std::ffi::OsString;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Git runner stand-in that records every invocation
///
/// A clone creates the target directory, like `git clone --mirror` would.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Vec<String>>>,
    failing: Vec<String>,
    slow: Vec<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any invocation whose arguments mention `name`
    pub fn failing_for(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    /// Hang (far past any test timeout) on invocations mentioning `name`
    pub fn slow_for(mut self, name: &str) -> Self {
        self.slow.push(name.to_string());
        self
    }

    /// Sleep this long in every invocation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn mentions(args: &[String], names: &[String]) -> bool {
        args.iter()
            .any(|arg| names.iter().any(|name| arg.contains(name.as_str())))
    }
}

/// Decrements the in-flight counter even when the call is cancelled
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GitRunner for RecordingRunner {
    async fn run(&self, args: &[OsString], _deadline: Instant) -> Result<()> {
        let args: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        self.calls.lock().unwrap().push(args.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if Self::mentions(&args, &self.slow) {
            tokio::time::sleep(Duration::from_secs(300)).await;
        }
        if Self::mentions(&args, &self.failing) {
            bail!("git {} failed: exit status: 1", args.join(" "));
        }

        if args.first().map(String::as_str) == Some("clone") {
            tokio::fs::create_dir_all(&args[3]).await?;
        }
        Ok(())
    }
}

/// Descriptor for `https://github.com/octocat/<name>.git`
pub fn repo(name: &str) -> RepoSpec {
    RepoSpec::new(name, format!("https://github.com/octocat/{}.git", name))
        .with_description(format!("The {} project", name))
}

/// Repository JSON as returned by `GET /users/{user}/repos`
pub fn repo_json(name: &str, private: bool, fork: bool) -> Value {
    json!({
        "id": name.len() as u64 + 1000,
        "node_id": format!("R_{}", name),
        "name": name,
        "full_name": format!("octocat/{}", name),
        "private": private,
        "fork": fork,
        "description": format!("The {} project", name),
        "url": format!("https://api.github.com/repos/octocat/{}", name),
        "html_url": format!("https://github.com/octocat/{}", name),
        "clone_url": format!("https://github.com/octocat/{}.git", name),
        "git_url": format!("git://github.com/octocat/{}.git", name),
        "ssh_url": format!("git@github.com:octocat/{}.git", name),
    })
}

/// In-memory log sink for asserting on tracing output
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Subscriber writing plain-text logs into `buffer`
pub fn capture_logs(buffer: &LogBuffer) -> impl tracing::Subscriber + Send + Sync {
    let buffer = buffer.clone();
    tracing_subscriber::fmt()
        .with_writer(move || buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish()
}

/// Whether a usable git executable is on PATH
pub fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
