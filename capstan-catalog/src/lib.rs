//! Capstan Catalog
//!
//! Read-only client for the work catalog: the persistent store of job
//! identifiers the scheduler polls every cycle.
//!
//! The catalog is the source of truth for what work exists. The scheduler
//! never caches its contents across cycles and never writes to it; the only
//! operations are fetching the full identifier set and looking up the
//! details of a single entry.

pub mod error;
mod sqlite;

// Re-export commonly used types
pub use error::{CatalogError, Result};
pub use sqlite::{IssueDetails, SqliteCatalog};

use async_trait::async_trait;
use capstan_core::JobId;

/// A provider of the full candidate identifier set
///
/// Implementations must return the complete set on every call; partial
/// results are worse than failure, because anything missing from the set
/// would silently never be dispatched. Any fault is fatal for the current
/// cycle only.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Returns every job identifier currently in the catalog
    async fn all_job_ids(&self) -> Result<Vec<JobId>>;
}
