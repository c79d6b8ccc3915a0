//! Polling scheduler
//!
//! Each cycle runs dedup → dispatch → drain → summary, then sleeps for the
//! poll interval. Per-job failures stay inside their `RunResult`; any fault
//! while computing a cycle is logged and degrades that cycle to a no-op.
//! The loop exits only on the shutdown signal, checked while sleeping, so a
//! dispatched cycle always drains its pool first.

use anyhow::{Context, Result};
use capstan_catalog::Catalog;
use capstan_core::{CycleSummary, JobId, RunResult};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dedup;
use crate::executor::{ActiveRuns, ToolExecutor};
use crate::state::StateStore;

/// Polling scheduler that repeatedly dispatches pending jobs
pub struct Poller {
    config: Config,
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn StateStore>,
    executor: Arc<dyn ToolExecutor>,
    semaphore: Arc<Semaphore>,
    active: ActiveRuns,
    shutdown: watch::Receiver<bool>,
}

impl Poller {
    /// Creates a new poller
    ///
    /// The semaphore sized by `max_parallel_runs` is the worker pool: a job
    /// is only spawned while holding one of its permits.
    pub fn new(
        config: Config,
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn StateStore>,
        executor: Arc<dyn ToolExecutor>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_parallel_runs));
        Self {
            config,
            catalog,
            store,
            executor,
            semaphore,
            active: ActiveRuns::new(),
            shutdown,
        }
    }

    /// Jobs currently executing, for observability
    pub fn active_runs(&self) -> &ActiveRuns {
        &self.active
    }

    /// Starts the polling loop; returns once shutdown is signalled
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Starting poll loop (interval: {:?}, max parallel runs: {})",
            self.config.poll_interval, self.config.max_parallel_runs
        );

        loop {
            info!("Starting cycle");

            match self.run_cycle().await {
                Ok(summary) => {
                    info!(
                        "Cycle complete: {} pending, {} succeeded, {} failed",
                        summary.pending, summary.succeeded, summary.failed
                    );
                }
                Err(e) => {
                    // Degraded cycle: nothing was dispatched, the loop
                    // comes back in one poll interval.
                    error!("Cycle failed: {:#}", e);
                }
            }

            debug!("Sleeping for {:?}", self.config.poll_interval);

            tokio::select! {
                _ = time::sleep(self.config.poll_interval) => {}
                changed = self.shutdown.changed() => {
                    // A closed channel means the process is going down too.
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("Shutdown acknowledged, exiting poll loop");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Runs one dedup → dispatch → drain cycle
    ///
    /// Every pending job is submitted to the pool exactly once, and the
    /// pool drains completely before the summary is returned; there is no
    /// partial-cycle carryover.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let pending = dedup::compute_pending(
            self.catalog.as_ref(),
            self.store.as_ref(),
            self.config.max_retries,
            self.config.retry_delay,
        )
        .await
        .context("Failed to fetch candidate set from catalog")?;

        let mut summary = CycleSummary {
            pending: pending.len(),
            ..Default::default()
        };

        if pending.is_empty() {
            debug!("No pending jobs this cycle");
            return Ok(summary);
        }

        info!("Found {} pending job(s)", pending.len());

        let mut handles = Vec::with_capacity(pending.len());

        for id in pending {
            // Waits for a free pool slot rather than skipping the job.
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .context("Worker pool semaphore closed")?;
            handles.push(self.spawn_run(id, permit));
        }

        for handle in handles {
            match handle.await {
                Ok(result) => summary.record(&result),
                Err(e) => {
                    // A panicked task still counts against the cycle.
                    warn!("Tool task panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Spawns a worker task for a single job
    fn spawn_run(&self, id: JobId, permit: OwnedSemaphorePermit) -> JoinHandle<RunResult> {
        let executor = Arc::clone(&self.executor);
        let active = self.active.clone();

        tokio::spawn(async move {
            // Guard drops before the permit, keeping the active set within
            // the pool bound on every exit path.
            let _permit = permit;
            let _guard = active.register(id.clone());
            executor.run(&id).await
        })
    }
}
