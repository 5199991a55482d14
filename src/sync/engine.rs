//! Sync orchestration.
//!
//! Validates a sync pair, picks the transfer direction, and drives
//! resolution, inventory, planning and scheduling in order. The first
//! error from any stage ends the run.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::error::{Result, SyncError};
use crate::fs::backend::{BucketConnector, MAX_PAGE_SIZE};
use crate::fs::local::LocalFs;
use crate::fs::types::{Endpoint, Locator, RemoteRef};
use crate::sync::exclude::ExcludePatterns;
use crate::sync::executor::{
    LocalToRemote, RemoteToLocal, RemoteToRemote, SharedExecutor, TransferTask,
};
use crate::sync::inventory::{build_local, build_remote, Inventory};
use crate::sync::planner::{plan_filtered, Plan};
use crate::sync::resolver::BucketRegistry;
use crate::sync::scheduler::{self, DEFAULT_CONCURRENCY};

/// Transfer direction chosen from the two endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    DirToRemote,
    RemoteToDir,
    RemoteToRemote,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncMode::DirToRemote => "directory to S3",
            SyncMode::RemoteToDir => "S3 to directory",
            SyncMode::RemoteToRemote => "S3 to S3",
        };
        f.write_str(name)
    }
}

/// Top-level run configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPair {
    pub source: String,
    pub target: String,
    /// Maximum simultaneous transfers
    pub concurrency: usize,
    /// Region probed first when locating buckets
    pub region: Option<String>,
}

impl SyncPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            concurrency: DEFAULT_CONCURRENCY,
            region: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }
}

/// Settings beyond the sync pair itself
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Keys requested per list call
    pub page_size: usize,
    /// Source paths never transferred
    pub exclude: ExcludePatterns,
    /// Plan only, transfer nothing
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            exclude: ExcludePatterns::new(),
            dry_run: false,
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub mode: SyncMode,
    /// Paths that differed between source and target
    pub planned: usize,
    pub transferred: usize,
    pub bytes: u64,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Where a run stands
#[derive(Debug, Clone)]
pub enum SyncState {
    Unvalidated,
    Validated(SyncMode),
    Done(SyncReport),
    Failed(String),
}

/// Drives one sync run
pub struct SyncEngine {
    pair: SyncPair,
    options: SyncOptions,
    connector: Arc<dyn BucketConnector>,
    state: SyncState,
}

impl SyncEngine {
    pub fn new(pair: SyncPair, connector: Arc<dyn BucketConnector>) -> Self {
        Self {
            pair,
            options: SyncOptions::default(),
            connector,
            state: SyncState::Unvalidated,
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Check the pair and pick the transfer direction.
    ///
    /// Each endpoint must be an existing local path or a well-formed remote
    /// reference, and at least one of them must be remote.
    pub fn validate(&mut self) -> Result<SyncMode> {
        match self.check_pair() {
            Ok(mode) => {
                self.state = SyncState::Validated(mode);
                Ok(mode)
            }
            Err(err) => {
                self.state = SyncState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    fn check_pair(&self) -> Result<SyncMode> {
        if self.pair.concurrency == 0 {
            return Err(SyncError::validation("concurrency must be at least 1"));
        }

        let source = valid_target(&self.pair.source)?;
        let target = valid_target(&self.pair.target)?;

        match (source.is_remote(), target.is_remote()) {
            (false, false) => Err(SyncError::validation(format!(
                "one of '{}' or '{}' must be an s3:// reference",
                self.pair.source, self.pair.target
            ))),
            (true, true) => Ok(SyncMode::RemoteToRemote),
            (true, false) => Ok(SyncMode::RemoteToDir),
            (false, true) => Ok(SyncMode::DirToRemote),
        }
    }

    /// Run the sync to completion
    pub async fn run(&mut self) -> Result<SyncReport> {
        let mode = match self.state {
            SyncState::Validated(mode) => mode,
            _ => self.validate()?,
        };

        let started_at = Utc::now();
        let clock = Instant::now();

        match self.execute(mode).await {
            Ok((planned, transferred)) => {
                let report = SyncReport {
                    mode,
                    planned,
                    transferred: transferred.transferred,
                    bytes: transferred.bytes,
                    dry_run: self.options.dry_run,
                    started_at,
                    elapsed: clock.elapsed(),
                };
                self.state = SyncState::Done(report.clone());
                Ok(report)
            }
            Err(err) => {
                self.state = SyncState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    async fn execute(&self, mode: SyncMode) -> Result<(usize, scheduler::TransferReport)> {
        let source = endpoint(&self.pair.source)?;
        let target = endpoint(&self.pair.target)?;
        let mut registry = BucketRegistry::new(self.connector.as_ref(), self.pair.region.clone());

        let (plan, tasks, executor): (Plan, Vec<TransferTask>, SharedExecutor) = match mode {
            SyncMode::DirToRemote => {
                let (local, remote) = local_remote(&source, &target)?;
                info!("Syncing to S3.");

                let source_files = local_inventory(local).await?;
                let bucket = registry.handle(&remote.bucket).await?;
                let target_files = build_remote(bucket.store.as_ref(), &remote.prefix, self.options.page_size)
                    .await?
                    .anchored(&remote.prefix);

                let plan = plan_filtered(&source_files, &target_files, &self.options.exclude);
                let tasks = plan
                    .paths()
                    .iter()
                    .map(|rel| TransferTask {
                        relative: rel.clone(),
                        source: Locator::Path(local.join(rel)),
                        target: Locator::Key(remote.key_for(rel)),
                    })
                    .collect();
                let executor: SharedExecutor = Arc::new(LocalToRemote::new(bucket));
                (plan, tasks, executor)
            }
            SyncMode::RemoteToDir => {
                let (local, remote) = local_remote(&target, &source)?;
                info!("Syncing from S3.");

                let bucket = registry.handle(&remote.bucket).await?;
                let source_files =
                    build_remote(bucket.store.as_ref(), &remote.prefix, self.options.page_size).await?;
                let target_files = local_inventory(local).await?;

                let plan = plan_filtered(&source_files, &target_files, &self.options.exclude);
                let tasks = plan
                    .paths()
                    .iter()
                    .map(|rel| TransferTask {
                        relative: rel.clone(),
                        source: Locator::Key(source_key(&source_files, remote, rel)),
                        target: Locator::Path(local.join(rel)),
                    })
                    .collect();
                let executor: SharedExecutor = Arc::new(RemoteToLocal::new(bucket));
                (plan, tasks, executor)
            }
            SyncMode::RemoteToRemote => {
                let (from, to) = remote_pair(&source, &target)?;
                info!("Syncing from S3 to S3.");

                let source_bucket = registry.handle(&from.bucket).await?;
                let target_bucket = registry.handle(&to.bucket).await?;
                let source_files =
                    build_remote(source_bucket.store.as_ref(), &from.prefix, self.options.page_size).await?;
                let target_files = build_remote(target_bucket.store.as_ref(), &to.prefix, self.options.page_size)
                    .await?
                    .anchored(&to.prefix);

                let plan = plan_filtered(&source_files, &target_files, &self.options.exclude);
                let tasks = plan
                    .paths()
                    .iter()
                    .map(|rel| TransferTask {
                        relative: rel.clone(),
                        source: Locator::Key(source_key(&source_files, from, rel)),
                        target: Locator::Key(to.key_for(rel)),
                    })
                    .collect();
                let executor: SharedExecutor = Arc::new(RemoteToRemote::new(source_bucket, target_bucket));
                (plan, tasks, executor)
            }
        };

        info!("{} of the source files need syncing.", plan.len());
        if self.options.dry_run {
            for task in &tasks {
                info!("Would sync: {} -> {}", task.source, task.target);
            }
            return Ok((plan.len(), scheduler::TransferReport::default()));
        }

        let report = scheduler::run(tasks, self.pair.concurrency, executor).await?;
        Ok((plan.len(), report))
    }
}

/// An endpoint is usable when it is an existing local path or a
/// syntactically valid remote reference
fn valid_target(raw: &str) -> Result<Endpoint> {
    match Endpoint::parse(raw) {
        Some(Endpoint::Local(path)) if !LocalFs::exists(&path) => Err(SyncError::validation(format!(
            "local path '{}' does not exist",
            raw
        ))),
        Some(endpoint) => Ok(endpoint),
        None => Err(SyncError::validation(format!("'{}' is not a valid s3:// reference", raw))),
    }
}

fn endpoint(raw: &str) -> Result<Endpoint> {
    Endpoint::parse(raw)
        .ok_or_else(|| SyncError::validation(format!("'{}' is not a valid s3:// reference", raw)))
}

fn local_remote<'a>(local: &'a Endpoint, remote: &'a Endpoint) -> Result<(&'a Path, &'a RemoteRef)> {
    match (local.as_local(), remote.as_remote()) {
        (Some(path), Some(remote)) => Ok((path, remote)),
        _ => Err(SyncError::validation("expected one local and one remote endpoint")),
    }
}

fn remote_pair<'a>(source: &'a Endpoint, target: &'a Endpoint) -> Result<(&'a RemoteRef, &'a RemoteRef)> {
    match (source.as_remote(), target.as_remote()) {
        (Some(from), Some(to)) => Ok((from, to)),
        _ => Err(SyncError::validation("expected two remote endpoints")),
    }
}

/// Key a planned path was listed under, falling back to the prefix join
fn source_key(inventory: &Inventory, remote: &RemoteRef, relative: &str) -> String {
    inventory
        .key(relative)
        .map(str::to_string)
        .unwrap_or_else(|| remote.key_for(relative))
}

/// Walk and hash off the async runtime
async fn local_inventory(root: &Path) -> Result<Inventory> {
    let root: PathBuf = root.to_path_buf();
    let label = root.clone();
    tokio::task::spawn_blocking(move || build_local(&root))
        .await
        .map_err(|e| SyncError::Task {
            path: label.display().to_string(),
            message: e.to_string(),
        })?
}
