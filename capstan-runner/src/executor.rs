//! Tool execution
//!
//! Runs the external tool for one job and reports the outcome. A failing
//! tool run is data in its `RunResult`, never an error of the cycle;
//! sibling jobs are unaffected.

use async_trait::async_trait;
use capstan_core::{JobId, RunResult};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::process::Command;
use tracing::{error, info};

/// Placeholder in configured tool arguments replaced by the job id
pub const JOB_ID_PLACEHOLDER: &str = "{job_id}";

/// Service trait for running the external tool against one job
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Runs the tool for `id` and reports the outcome
    ///
    /// Never fails: a non-zero exit status or launch fault is a
    /// `succeeded = false` result carrying the diagnostic text.
    async fn run(&self, id: &JobId) -> RunResult;
}

/// Set of jobs currently executing
///
/// Registration hands back a guard; dropping the guard deregisters, so a
/// job leaves the set on every exit path, a panicking task included.
/// Capacity is enforced by the worker pool's semaphore, not here.
#[derive(Clone, Default)]
pub struct ActiveRuns {
    inner: Arc<Mutex<HashSet<JobId>>>,
}

impl ActiveRuns {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` as in flight and returns the owning guard
    pub fn register(&self, id: JobId) -> ActiveRunGuard {
        self.inner.lock().unwrap().insert(id.clone());
        ActiveRunGuard {
            id,
            runs: Arc::clone(&self.inner),
        }
    }

    /// Number of jobs currently in flight
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Whether no jobs are in flight
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is currently in flight
    pub fn contains(&self, id: &JobId) -> bool {
        self.inner.lock().unwrap().contains(id)
    }
}

/// Removes its job from [`ActiveRuns`] on drop
pub struct ActiveRunGuard {
    id: JobId,
    runs: Arc<Mutex<HashSet<JobId>>>,
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        // Must not panic inside drop; take the set even if poisoned.
        let mut runs = match self.runs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        runs.remove(&self.id);
    }
}

/// Runs the configured tool command as a subprocess
///
/// Success is exit status zero. Captured stderr (or the launch error) is
/// the diagnostic attached to a failed result.
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
}

impl CommandExecutor {
    /// Creates an executor for `program` with an argument template
    ///
    /// Occurrences of `{job_id}` in `args` are substituted with the job id
    /// on every run.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn args_for(&self, id: &JobId) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(JOB_ID_PLACEHOLDER, id.as_str()))
            .collect()
    }
}

#[async_trait]
impl ToolExecutor for CommandExecutor {
    async fn run(&self, id: &JobId) -> RunResult {
        info!("Starting tool run for job {}", id);
        let started = Instant::now();

        let output = Command::new(&self.program)
            .args(self.args_for(id))
            .output()
            .await;

        let duration = started.elapsed();

        match output {
            Ok(output) if output.status.success() => {
                info!("Tool run succeeded for job {} in {:?}", id, duration);
                RunResult::success(id.clone(), duration)
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let diagnostic = if stderr.trim().is_empty() {
                    format!("tool exited with {}", output.status)
                } else {
                    stderr.trim_end().to_string()
                };
                error!("Tool run failed for job {}: {}", id, diagnostic);
                RunResult::failure(id.clone(), diagnostic, duration)
            }
            Err(err) => {
                let diagnostic = format!("failed to launch {}: {}", self.program, err);
                error!("Tool run failed for job {}: {}", id, diagnostic);
                RunResult::failure(id.clone(), diagnostic, duration)
            }
        }
    }
}
