//! Scheduler integration tests
//!
//! Exercise full poll cycles against a fake catalog, a real tracking file
//! on disk, and a recording executor.

use async_trait::async_trait;
use capstan_catalog::{Catalog, CatalogError};
use capstan_core::{JobId, RunResult};
use capstan_runner::config::Config;
use capstan_runner::executor::ToolExecutor;
use capstan_runner::scheduler::Poller;
use capstan_runner::state::FileStateStore;
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::File;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

struct FakeCatalog {
    ids: Vec<&'static str>,
    fail: bool,
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn all_job_ids(&self) -> capstan_catalog::Result<Vec<JobId>> {
        if self.fail {
            return Err(CatalogError::NotFound("catalog offline".to_string()));
        }
        Ok(self.ids.iter().copied().map(JobId::from).collect())
    }
}

/// Executor that records every run and tracks observed concurrency
struct RecordingExecutor {
    fail_ids: HashSet<&'static str>,
    delay: Duration,
    ran: Mutex<Vec<String>>,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl RecordingExecutor {
    fn new(fail_ids: &[&'static str], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fail_ids: fail_ids.iter().copied().collect(),
            delay,
            ran: Mutex::new(Vec::new()),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        })
    }

    fn ran_ids(&self) -> Vec<String> {
        self.ran.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for RecordingExecutor {
    async fn run(&self, id: &JobId) -> RunResult {
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.ran.lock().unwrap().push(id.as_str().to_string());
        self.concurrent.fetch_sub(1, Ordering::SeqCst);

        if self.fail_ids.contains(id.as_str()) {
            RunResult::failure(id.clone(), format!("synthetic failure for {}", id), self.delay)
        } else {
            RunResult::success(id.clone(), self.delay)
        }
    }
}

fn test_config(dir: &tempfile::TempDir, max_parallel_runs: usize) -> Config {
    Config {
        tracking_file_path: dir.path().join("tool_runs.json"),
        poll_interval: Duration::from_millis(50),
        max_retries: 2,
        retry_delay: Duration::from_millis(10),
        max_parallel_runs,
        ..Config::default()
    }
}

fn build_poller(
    config: Config,
    catalog: FakeCatalog,
    executor: Arc<RecordingExecutor>,
) -> (Poller, watch::Sender<bool>) {
    let store = Arc::new(FileStateStore::new(config.tracking_file_path.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = Poller::new(config, Arc::new(catalog), store, executor, shutdown_rx);
    (poller, shutdown_tx)
}

#[tokio::test]
async fn test_cycle_dispatches_all_untracked_jobs_and_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog {
        ids: vec!["A", "B", "C"],
        fail: false,
    };
    let executor = RecordingExecutor::new(&["B"], Duration::from_millis(5));
    let (poller, _shutdown) = build_poller(test_config(&dir, 10), catalog, executor.clone());

    let summary = poller.run_cycle().await.unwrap();

    assert_eq!(summary.pending, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);

    let ran: HashSet<String> = executor.ran_ids().into_iter().collect();
    assert_eq!(ran, HashSet::from(["A".into(), "B".into(), "C".into()]));
    assert_eq!(executor.ran_ids().len(), 3, "each job runs exactly once");
}

#[tokio::test]
async fn test_tracked_jobs_are_not_redispatched() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir, 10);
    std::fs::write(&config.tracking_file_path, r#"{"A": {"status": "done"}}"#).unwrap();

    let catalog = FakeCatalog {
        ids: vec!["A", "B"],
        fail: false,
    };
    let executor = RecordingExecutor::new(&[], Duration::from_millis(1));
    let (poller, _shutdown) = build_poller(config, catalog, executor.clone());

    let summary = poller.run_cycle().await.unwrap();

    assert_eq!(summary.pending, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(executor.ran_ids(), vec!["B".to_string()]);
}

#[tokio::test]
async fn test_parallelism_is_bounded_by_pool_size() {
    let dir = tempfile::tempdir().unwrap();
    let ids: Vec<&'static str> = vec![
        "J01", "J02", "J03", "J04", "J05", "J06", "J07", "J08", "J09", "J10", "J11", "J12", "J13",
        "J14", "J15", "J16", "J17", "J18", "J19", "J20",
    ];
    let catalog = FakeCatalog {
        ids: ids.clone(),
        fail: false,
    };
    let executor = RecordingExecutor::new(&[], Duration::from_millis(25));
    let (poller, _shutdown) = build_poller(test_config(&dir, 3), catalog, executor.clone());

    let summary = poller.run_cycle().await.unwrap();

    assert_eq!(summary.pending, 20);
    assert_eq!(summary.succeeded, 20);
    assert!(
        executor.max_concurrent.load(Ordering::SeqCst) <= 3,
        "observed concurrency exceeded the pool size"
    );

    let unique: HashSet<String> = executor.ran_ids().into_iter().collect();
    assert_eq!(unique.len(), 20);
    assert!(poller.active_runs().is_empty(), "pool fully drained");
}

#[tokio::test]
async fn test_locked_tracking_file_degrades_cycle_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir, 10);
    std::fs::write(&config.tracking_file_path, "{}").unwrap();

    let writer = File::open(&config.tracking_file_path).unwrap();
    FileExt::lock_exclusive(&writer).unwrap();

    let catalog = FakeCatalog {
        ids: vec!["A", "B"],
        fail: false,
    };
    let executor = RecordingExecutor::new(&[], Duration::from_millis(1));
    let (poller, _shutdown) = build_poller(config, catalog, executor.clone());

    let summary = poller.run_cycle().await.unwrap();

    assert_eq!(summary.pending, 0);
    assert!(executor.ran_ids().is_empty(), "no jobs dispatched");

    FileExt::unlock(&writer).unwrap();

    // Held for fewer than max_retries * retry_delay now: the next cycle
    // reads the file and dispatches.
    let summary = poller.run_cycle().await.unwrap();
    assert_eq!(summary.pending, 2);
}

#[tokio::test]
async fn test_catalog_failure_fails_the_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog {
        ids: vec![],
        fail: true,
    };
    let executor = RecordingExecutor::new(&[], Duration::ZERO);
    let (poller, _shutdown) = build_poller(test_config(&dir, 10), catalog, executor.clone());

    assert!(poller.run_cycle().await.is_err());
    assert!(executor.ran_ids().is_empty());
}

#[tokio::test]
async fn test_run_drains_cycle_then_exits_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog {
        ids: vec!["A", "B"],
        fail: false,
    };
    let executor = RecordingExecutor::new(&[], Duration::from_millis(10));
    let (mut poller, shutdown) = build_poller(test_config(&dir, 10), catalog, executor.clone());

    // Signal before the loop starts: the first cycle still runs to
    // completion because shutdown is only observed at the sleep boundary.
    shutdown.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(5), poller.run())
        .await
        .expect("poller should exit promptly on shutdown")
        .unwrap();

    let ran: HashSet<String> = executor.ran_ids().into_iter().collect();
    assert_eq!(ran, HashSet::from(["A".into(), "B".into()]));
}
