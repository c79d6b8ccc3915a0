//! SQLite catalog access
//!
//! The catalog is an `issues` table keyed by `M_ID`. Connections are opened
//! read-only so the scheduler can never corrupt the catalog, and so it
//! coexists with whatever process populates the table.

use async_trait::async_trait;
use capstan_core::JobId;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::debug;

use crate::Catalog;
use crate::error::{CatalogError, Result};

/// Title and description of one catalog issue
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IssueDetails {
    pub title: String,
    pub description: String,
}

/// Read-only SQLite implementation of [`Catalog`]
#[derive(Debug)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Opens the catalog database at `path`
    ///
    /// Fails with [`CatalogError::NotFound`] if no file exists there; a
    /// read-only connection must never create an empty database, which would
    /// make every cycle report zero candidates.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CatalogError::NotFound(path.display().to_string()));
        }

        let options = SqliteConnectOptions::new().filename(path).read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Cheap availability probe, used once at startup
    pub async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM issues")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns title and description for one issue, if present
    pub async fn issue(&self, id: &JobId) -> Result<Option<IssueDetails>> {
        let details = sqlx::query_as::<_, IssueDetails>(
            "SELECT Title AS title, Description AS description FROM issues WHERE M_ID = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(details)
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn all_job_ids(&self) -> Result<Vec<JobId>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT M_ID FROM issues")
            .fetch_all(&self.pool)
            .await?;

        debug!("Catalog returned {} job id(s)", ids.len());

        Ok(ids.into_iter().map(JobId::from).collect())
    }
}
