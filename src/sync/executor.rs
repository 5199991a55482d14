//! Single-item transfer strategies.
//!
//! Each executor moves one item with one full read followed by one full
//! write. Failures are returned to the scheduler, which aborts the run.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{Result, SyncError};
use crate::fs::backend::{Acl, BucketHandle, DEFAULT_CONTENT_TYPE};
use crate::fs::local::{LocalFs, FILE_MODE};
use crate::fs::types::{Locator, REMOTE_SCHEME};

/// One planned copy: the relative path plus where it is read and written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    pub relative: String,
    pub source: Locator,
    pub target: Locator,
}

impl TransferTask {
    fn source_path(&self) -> Result<&Path> {
        expect_path(&self.source, &self.relative)
    }

    fn target_path(&self) -> Result<&Path> {
        expect_path(&self.target, &self.relative)
    }

    fn source_key(&self) -> Result<&str> {
        expect_key(&self.source, &self.relative)
    }

    fn target_key(&self) -> Result<&str> {
        expect_key(&self.target, &self.relative)
    }
}

fn expect_path<'a>(locator: &'a Locator, relative: &str) -> Result<&'a Path> {
    match locator {
        Locator::Path(path) => Ok(path),
        Locator::Key(key) => Err(SyncError::validation(format!(
            "transfer of '{}' expected a local path, got key '{}'",
            relative, key
        ))),
    }
}

fn expect_key<'a>(locator: &'a Locator, relative: &str) -> Result<&'a str> {
    match locator {
        Locator::Key(key) => Ok(key),
        Locator::Path(path) => Err(SyncError::validation(format!(
            "transfer of '{}' expected an object key, got path {}",
            relative,
            path.display()
        ))),
    }
}

/// Copies one item from source to target, returning the bytes moved
#[async_trait]
pub trait TransferExecutor: Send + Sync {
    async fn transfer(&self, task: &TransferTask) -> Result<u64>;
}

/// Content type for an upload, inferred from the name's extension
pub fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

fn remote_label(bucket: &BucketHandle, key: &str) -> String {
    format!("{}{}/{}", REMOTE_SCHEME, bucket.name, key)
}

/// Local file to bucket object
pub struct LocalToRemote {
    target: BucketHandle,
}

impl LocalToRemote {
    pub fn new(target: BucketHandle) -> Self {
        Self { target }
    }
}

#[async_trait]
impl TransferExecutor for LocalToRemote {
    async fn transfer(&self, task: &TransferTask) -> Result<u64> {
        let file_path = task.source_path()?;
        let key = task.target_key()?;
        let label = remote_label(&self.target, key);
        info!("Starting sync: {} -> {}", file_path.display(), label);

        let data = LocalFs::read(file_path).await?;
        let size = data.len() as u64;
        let content_type = content_type_for(&file_path.to_string_lossy());

        self.target
            .store
            .put(key, data, &content_type, Acl::Private)
            .await
            .map_err(|e| SyncError::remote("uploading", label.clone(), e))?;

        info!("Sync completed successfully: {} -> {}.", file_path.display(), label);
        Ok(size)
    }
}

/// Bucket object to local file
pub struct RemoteToLocal {
    source: BucketHandle,
}

impl RemoteToLocal {
    pub fn new(source: BucketHandle) -> Self {
        Self { source }
    }
}

#[async_trait]
impl TransferExecutor for RemoteToLocal {
    async fn transfer(&self, task: &TransferTask) -> Result<u64> {
        let key = task.source_key()?;
        let file_path = task.target_path()?;
        let label = remote_label(&self.source, key);
        info!("Starting sync: {} -> {}.", label, file_path.display());

        let data = self
            .source
            .store
            .get(key)
            .await
            .map_err(|e| SyncError::remote("downloading", label.clone(), e))?;

        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                LocalFs::make_dirs(parent).await?;
            }
        }
        LocalFs::write(file_path, &data, FILE_MODE).await?;

        info!("Sync completed successfully: {} -> {}.", label, file_path.display());
        Ok(data.len() as u64)
    }
}

/// Object in one bucket to object in another (or the same) bucket
pub struct RemoteToRemote {
    source: BucketHandle,
    target: BucketHandle,
}

impl RemoteToRemote {
    pub fn new(source: BucketHandle, target: BucketHandle) -> Self {
        Self { source, target }
    }
}

#[async_trait]
impl TransferExecutor for RemoteToRemote {
    async fn transfer(&self, task: &TransferTask) -> Result<u64> {
        let source_key = task.source_key()?;
        let target_key = task.target_key()?;
        let source_label = remote_label(&self.source, source_key);
        let target_label = remote_label(&self.target, target_key);
        info!("Starting sync: {} -> {}.", source_label, target_label);

        let data = self
            .source
            .store
            .get(source_key)
            .await
            .map_err(|e| SyncError::remote("downloading", source_label.clone(), e))?;
        let size = data.len() as u64;
        let content_type = content_type_for(target_key);

        self.target
            .store
            .put(target_key, data, &content_type, Acl::Private)
            .await
            .map_err(|e| SyncError::remote("uploading", target_label.clone(), e))?;

        info!("Sync completed successfully: {} -> {}.", source_label, target_label);
        Ok(size)
    }
}

/// Shared handle to whichever executor a mode selected
pub type SharedExecutor = Arc<dyn TransferExecutor>;
