//! Bounded transfer scheduling.
//!
//! A pool of reservation tokens gates task launch: the coordinator takes a
//! token before spawning each transfer and the transfer hands it back when
//! it finishes, whatever the outcome. Completions are reported on a channel
//! that the coordinator drains. The first failure stops further launches;
//! transfers already running are allowed to finish before the run returns.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace};

use crate::error::{Result, SyncError};
use crate::sync::executor::{TransferExecutor, TransferTask};

/// Default number of simultaneous transfers
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Totals for a scheduler run that completed without failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub transferred: usize,
    pub bytes: u64,
}

struct TaskOutcome {
    path: String,
    result: Result<u64>,
}

/// Run every task with at most `concurrency` in flight.
///
/// Returns the first error observed, in completion order, once all
/// launched transfers have finished.
pub async fn run(
    tasks: Vec<TransferTask>,
    concurrency: usize,
    executor: Arc<dyn TransferExecutor>,
) -> Result<TransferReport> {
    let pool = Arc::new(Semaphore::new(concurrency.max(1)));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<TaskOutcome>();
    let mut in_flight = JoinSet::new();
    let mut tally = Tally::default();

    for task in tasks {
        trace!("Requesting reservation for '{}'.", task.relative);
        let permit = match pool.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                tally.fail(SyncError::Task {
                    path: task.relative.clone(),
                    message: "reservation pool closed".to_string(),
                });
                break;
            }
        };
        trace!("Retrieved reservation for '{}'.", task.relative);

        // A failed transfer reports before returning its token, so any
        // failure that freed this token is visible here
        while let Ok(outcome) = done_rx.try_recv() {
            tally.record(outcome);
        }
        if tally.failed() {
            debug!("Not starting '{}' after an earlier failure.", task.relative);
            break;
        }

        let executor = Arc::clone(&executor);
        let done_tx = done_tx.clone();
        in_flight.spawn(async move {
            let path = task.relative.clone();
            let result = AssertUnwindSafe(executor.transfer(&task))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(SyncError::Task {
                        path: task.relative.clone(),
                        message: "transfer panicked".to_string(),
                    })
                });
            let _ = done_tx.send(TaskOutcome { path, result });
            drop(permit);
        });
    }
    drop(done_tx);

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tally.fail(SyncError::Task {
                path: "<unknown>".to_string(),
                message: e.to_string(),
            });
        }
    }
    while let Some(outcome) = done_rx.recv().await {
        tally.record(outcome);
    }

    match tally.first_error {
        Some(err) => Err(err),
        None => {
            info!("Transferred {} file(s).", tally.report.transferred);
            Ok(tally.report)
        }
    }
}

#[derive(Default)]
struct Tally {
    report: TransferReport,
    first_error: Option<SyncError>,
}

impl Tally {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome.result {
            Ok(bytes) => {
                self.report.transferred += 1;
                self.report.bytes += bytes;
            }
            Err(err) => {
                error!("Sync failed for '{}': {}", outcome.path, err);
                self.fail(err);
            }
        }
    }

    fn fail(&mut self, err: SyncError) {
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }

    fn failed(&self) -> bool {
        self.first_error.is_some()
    }
}
