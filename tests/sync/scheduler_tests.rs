// Tests for bounded, fail-fast transfer scheduling

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bucketsync::error::{ErrorKind, Result, SyncError};
use bucketsync::fs::Locator;
use bucketsync::sync::{scheduler, TransferExecutor, TransferTask};

#[derive(Default)]
struct RecordingExecutor {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay_ms: u64,
    active: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl RecordingExecutor {
    fn with_delay(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Default::default()
        }
    }

    fn failing_on(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    fn panicking_on(mut self, path: &str) -> Self {
        self.panicking.insert(path.to_string());
        self
    }
}

#[async_trait]
impl TransferExecutor for RecordingExecutor {
    async fn transfer(&self, task: &TransferTask) -> Result<u64> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);

        if self.panicking.contains(&task.relative) {
            panic!("executor blew up on {}", task.relative);
        }
        if self.failing.contains(&task.relative) {
            return Err(SyncError::validation(format!("cannot copy {}", task.relative)));
        }
        Ok(task.relative.len() as u64)
    }
}

fn tasks(count: usize) -> Vec<TransferTask> {
    (0..count)
        .map(|i| TransferTask {
            relative: format!("f{i:02}"),
            source: Locator::Key(format!("src/f{i:02}")),
            target: Locator::Key(format!("dst/f{i:02}")),
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_never_more_than_limit_in_flight() {
    let executor = Arc::new(RecordingExecutor::with_delay(10));

    let report = scheduler::run(tasks(40), 5, executor.clone()).await.unwrap();

    assert_eq!(report.transferred, 40);
    assert_eq!(report.bytes, 40 * 3);
    let peak = executor.peak.load(Ordering::SeqCst);
    assert!(peak <= 5, "peak {peak} exceeds limit");
    assert!(peak >= 2, "expected some overlap, peak was {peak}");
}

#[tokio::test]
async fn test_limit_of_one_runs_serially() {
    let executor = Arc::new(RecordingExecutor::with_delay(1));

    scheduler::run(tasks(6), 1, executor.clone()).await.unwrap();

    assert_eq!(executor.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_drains_in_flight_work() {
    let executor = Arc::new(RecordingExecutor::with_delay(5).failing_on("f03"));

    let err = scheduler::run(tasks(30), 4, executor.clone()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("f03"));
    let started = executor.started.load(Ordering::SeqCst);
    assert_eq!(started, executor.finished.load(Ordering::SeqCst));
    assert_eq!(executor.active.load(Ordering::SeqCst), 0);
    assert!(started < 30, "launching should stop after the failure");
}

#[tokio::test]
async fn test_no_launch_after_serial_failure() {
    let executor = Arc::new(RecordingExecutor::with_delay(1).failing_on("f00"));

    assert!(scheduler::run(tasks(10), 1, executor.clone()).await.is_err());

    assert_eq!(executor.started.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panic_becomes_task_error() {
    let executor = Arc::new(RecordingExecutor::with_delay(1).panicking_on("f01"));

    let err = scheduler::run(tasks(3), 2, executor).await.unwrap_err();

    assert!(matches!(err, SyncError::Task { ref path, .. } if path == "f01"));
}
