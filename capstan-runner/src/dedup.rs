//! Pending-set computation
//!
//! One cycle's work is the catalog's candidate set minus the ids already in
//! the tracking file. Lock contention on the tracking file is retried a
//! bounded number of times; corruption or an exhausted retry budget degrade
//! the cycle to an empty pending set instead of dispatching against state
//! that cannot be trusted.

use capstan_catalog::Catalog;
use capstan_core::JobId;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{error, warn};

use crate::state::{StateError, StateStore};

/// Computes the set of jobs to dispatch this cycle
///
/// The catalog is queried exactly once and its failure propagates: with no
/// candidate set there is no meaningful cycle. The tracking file is read up
/// to `max_retries` times with `retry_delay` between attempts, retrying only
/// on lock contention.
pub async fn compute_pending(
    catalog: &dyn Catalog,
    store: &dyn StateStore,
    max_retries: u32,
    retry_delay: Duration,
) -> capstan_catalog::Result<HashSet<JobId>> {
    let candidates: HashSet<JobId> = catalog.all_job_ids().await?.into_iter().collect();

    for attempt in 1..=max_retries {
        match store.read() {
            Ok(tracked) => {
                return Ok(candidates
                    .into_iter()
                    .filter(|id| !tracked.contains_key(id.as_str()))
                    .collect());
            }
            Err(StateError::Locked) => {
                warn!(
                    "Tracking file locked for writing (attempt {}/{})",
                    attempt, max_retries
                );
                if attempt < max_retries {
                    tokio::time::sleep(retry_delay).await;
                }
            }
            Err(err) => {
                error!("Tracking file unreadable, skipping this cycle: {}", err);
                return Ok(HashSet::new());
            }
        }
    }

    warn!(
        "Tracking file still locked after {} attempt(s), skipping this cycle",
        max_retries
    );
    Ok(HashSet::new())
}
