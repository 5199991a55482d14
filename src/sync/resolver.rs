//! Locates the region serving a bucket.
//!
//! A region is probed with a zero-result list call. The hinted region, when
//! given, goes first; otherwise every reachable region is tried in order and
//! the first one that answers wins.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::fs::backend::{BucketConnector, BucketHandle, StoreError, UNSUPPORTED_REGIONS};

/// Find the region hosting `bucket`.
///
/// A wrong-region answer moves on to the next candidate. Any other failure
/// during the scan aborts resolution. A failing hint only falls back to the
/// full scan.
pub async fn resolve(
    connector: &dyn BucketConnector,
    bucket: &str,
    region_hint: Option<&str>,
) -> Result<BucketHandle> {
    info!("Looking up region for bucket '{}'.", bucket);

    if let Some(hint) = region_hint {
        match probe(connector, bucket, hint).await {
            Ok(handle) => {
                info!("Found bucket '{}' in hinted region '{}'.", bucket, hint);
                return Ok(handle);
            }
            Err(e) => warn!(
                "Bucket '{}' not reachable in hinted region '{}' ({}), scanning all regions.",
                bucket, hint, e
            ),
        }
    }

    for region in connector.regions() {
        if UNSUPPORTED_REGIONS.contains(&region.as_str()) || region_hint == Some(region.as_str()) {
            continue;
        }

        debug!("Looking for bucket '{}' in '{}'.", bucket, region);
        match probe(connector, bucket, &region).await {
            Ok(handle) => {
                info!("Found bucket '{}' in '{}'.", bucket, region);
                return Ok(handle);
            }
            Err(e) if e.is_wrong_region() => {
                debug!("Bucket '{}' not found in '{}'.", bucket, region);
            }
            // Bucket names are global, so a missing bucket is missing everywhere
            Err(StoreError::NotFound { .. }) => break,
            Err(e) => {
                return Err(SyncError::remote(
                    format!("probing region {} for", region),
                    format!("bucket '{}'", bucket),
                    e,
                ))
            }
        }
    }

    Err(SyncError::BucketNotFound {
        bucket: bucket.to_string(),
    })
}

async fn probe(
    connector: &dyn BucketConnector,
    bucket: &str,
    region: &str,
) -> std::result::Result<BucketHandle, StoreError> {
    let store = connector.connect(bucket, region).await?;
    store.list("", None, 0).await?;
    Ok(BucketHandle {
        name: bucket.to_string(),
        region: region.to_string(),
        store,
    })
}

/// Handles resolved during one run, keyed by bucket name
pub struct BucketRegistry<'a> {
    connector: &'a dyn BucketConnector,
    region_hint: Option<String>,
    handles: HashMap<String, BucketHandle>,
}

impl<'a> BucketRegistry<'a> {
    pub fn new(connector: &'a dyn BucketConnector, region_hint: Option<String>) -> Self {
        Self {
            connector,
            region_hint,
            handles: HashMap::new(),
        }
    }

    /// Resolve a bucket, reusing the handle if it was already resolved
    pub async fn handle(&mut self, bucket: &str) -> Result<BucketHandle> {
        if let Some(handle) = self.handles.get(bucket) {
            return Ok(handle.clone());
        }
        let handle = resolve(self.connector, bucket, self.region_hint.as_deref()).await?;
        self.handles.insert(bucket.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn resolved(&self) -> usize {
        self.handles.len()
    }
}
