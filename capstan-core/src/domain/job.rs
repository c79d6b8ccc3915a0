//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque identifier for one unit of work
///
/// Issued by the catalog and never interpreted by the scheduler. Equality,
/// hashing, and display are all the runner needs from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a job id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id and returns the underlying string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Result of one external tool run
///
/// Produced by the executor for every dispatched job, success or failure.
/// Tool failures are data, not errors: they never abort the cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub job_id: JobId,
    pub succeeded: bool,
    /// Diagnostic text captured from the tool (stderr, or the launch error)
    pub error_output: Option<String>,
    /// Wall-clock time spent in the tool invocation
    pub duration: Duration,
}

impl RunResult {
    /// Creates a successful run result
    pub fn success(job_id: JobId, duration: Duration) -> Self {
        Self {
            job_id,
            succeeded: true,
            error_output: None,
            duration,
        }
    }

    /// Creates a failed run result with captured diagnostic output
    pub fn failure(job_id: JobId, error_output: impl Into<String>, duration: Duration) -> Self {
        Self {
            job_id,
            succeeded: false,
            error_output: Some(error_output.into()),
            duration,
        }
    }
}

/// Outcome counts for one scheduler cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Jobs discovered as pending at the start of the cycle
    pub pending: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl CycleSummary {
    /// Tallies one run result into the summary
    pub fn record(&mut self, result: &RunResult) {
        if result.succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}
