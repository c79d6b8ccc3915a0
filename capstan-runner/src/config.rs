//! Runner configuration
//!
//! Defines all configurable parameters for the runner including the catalog
//! and tracking-file paths, polling and retry timing, and the external tool
//! command line.

use std::path::PathBuf;
use std::time::Duration;

/// Runner configuration
///
/// Every option has a default so the runner can start with no environment
/// at all; the defaults match a co-located catalog and tracking file.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite catalog database
    pub catalog_db_path: PathBuf,

    /// Path to the shared tracking file of already-dispatched jobs
    pub tracking_file_path: PathBuf,

    /// Program to invoke once per pending job
    pub tool_command: String,

    /// Arguments passed to the tool; `{job_id}` is substituted per job
    pub tool_args: Vec<String>,

    /// How long to sleep between polling cycles
    pub poll_interval: Duration,

    /// How many times to attempt a tracking-file read when it is locked
    pub max_retries: u32,

    /// Delay between tracking-file read attempts
    pub retry_delay: Duration,

    /// Max tool runs in flight at once
    pub max_parallel_runs: usize,

    /// Log file path; logs go to stderr when unset
    pub log_destination: Option<PathBuf>,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Recognized environment variables (all optional):
    /// - CATALOG_DB (default: issues_database.sqlite)
    /// - TRACKING_FILE (default: tool_runs.json)
    /// - TOOL_COMMAND (default: tool-run)
    /// - TOOL_ARGS (whitespace-separated, default: "--job-id {job_id}")
    /// - POLL_INTERVAL (seconds, default: 3600)
    /// - MAX_RETRIES (default: 3)
    /// - RETRY_DELAY (seconds, default: 5)
    /// - MAX_PARALLEL_RUNS (default: 10)
    /// - LOG_FILE (default: unset, log to stderr)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let catalog_db_path = std::env::var("CATALOG_DB")
            .map(PathBuf::from)
            .unwrap_or(defaults.catalog_db_path);

        let tracking_file_path = std::env::var("TRACKING_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.tracking_file_path);

        let tool_command = std::env::var("TOOL_COMMAND").unwrap_or(defaults.tool_command);

        let tool_args = std::env::var("TOOL_ARGS")
            .map(|s| parse_tool_args(&s))
            .unwrap_or(defaults.tool_args);

        let poll_interval = std::env::var("POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);

        let max_retries = std::env::var("MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.max_retries);

        let retry_delay = std::env::var("RETRY_DELAY")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.retry_delay);

        let max_parallel_runs = std::env::var("MAX_PARALLEL_RUNS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.max_parallel_runs);

        let log_destination = std::env::var("LOG_FILE").ok().map(PathBuf::from);

        Self {
            catalog_db_path,
            tracking_file_path,
            tool_command,
            tool_args,
            poll_interval,
            max_retries,
            retry_delay,
            max_parallel_runs,
            log_destination,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tool_command.is_empty() {
            anyhow::bail!("tool_command cannot be empty");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.max_retries == 0 {
            anyhow::bail!("max_retries must be greater than 0");
        }

        if self.max_parallel_runs == 0 {
            anyhow::bail!("max_parallel_runs must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_db_path: PathBuf::from("issues_database.sqlite"),
            tracking_file_path: PathBuf::from("tool_runs.json"),
            tool_command: "tool-run".to_string(),
            tool_args: vec!["--job-id".to_string(), "{job_id}".to_string()],
            poll_interval: Duration::from_secs(3600),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            max_parallel_runs: 10,
            log_destination: None,
        }
    }
}

/// Splits a TOOL_ARGS value into individual arguments on whitespace
fn parse_tool_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}
