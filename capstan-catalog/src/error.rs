//! Error types for the catalog client

use thiserror::Error;

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur when querying the work catalog
///
/// Every variant is fatal for the current scheduler cycle only; the poll
/// loop logs it and retries on the next cycle.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The database could not be opened or queried
    #[error("catalog query failed: {0}")]
    Database(#[from] sqlx::Error),

    /// No catalog database exists at the configured path
    #[error("catalog database not found at {0}")]
    NotFound(String),
}

impl CatalogError {
    /// Check if this error means the database file is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
