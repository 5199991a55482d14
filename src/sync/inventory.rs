//! Content-addressed inventories of one namespace.
//!
//! An inventory maps a slash-separated relative path to the digest of the
//! item's content. Local inventories are built by walking and hashing a
//! directory tree, remote ones by following a paginated bucket listing.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::fs::backend::{ObjectStore, MAX_PAGE_SIZE};
use crate::fs::local::LocalFs;
use crate::fs::types::anchor;
use crate::sync::hash::{hash_file, unquote_etag};

/// Immutable snapshot of one side of a sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    entries: BTreeMap<String, String>,
    /// Object key of each remote entry
    keys: BTreeMap<String, String>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a digest for a relative path, replacing any earlier value
    pub fn insert(&mut self, path: impl Into<String>, digest: impl Into<String>) {
        self.entries.insert(path.into(), digest.into());
    }

    /// Record a remote entry together with the key it was listed under
    pub fn insert_key(&mut self, path: impl Into<String>, digest: impl Into<String>, key: impl Into<String>) {
        let path = path.into();
        self.keys.insert(path.clone(), key.into());
        self.entries.insert(path, digest.into());
    }

    /// Object key a remote entry was listed under
    pub fn key(&self, path: &str) -> Option<&str> {
        self.keys.get(path).map(String::as_str)
    }

    /// Keep only entries stored where `anchor(prefix, path)` would put them.
    ///
    /// An object named exactly by the prefix is listed under its file name,
    /// but uploads to that path land one level below it, so it never
    /// counts as a copy of the path.
    pub fn anchored(mut self, prefix: &str) -> Self {
        let keys = &self.keys;
        self.entries
            .retain(|path, _| keys.get(path).map_or(true, |key| *key == anchor(prefix, path)));
        let entries = &self.entries;
        self.keys.retain(|path, _| entries.contains_key(path));
        self
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in lexicographic path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, d)| (p.as_str(), d.as_str()))
    }
}

impl FromIterator<(String, String)> for Inventory {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            keys: BTreeMap::new(),
        }
    }
}

/// Path of `item` relative to `root`.
///
/// The root is removed as an exact string prefix, never as a set of
/// characters, then leading separators are dropped. A root of `.` or the
/// empty string removes nothing but a leading `./` or separators.
pub fn relative_path(root: &str, item: &str) -> String {
    let stripped = if root.is_empty() || root == "." {
        item.strip_prefix("./").unwrap_or(item)
    } else {
        item.strip_prefix(root).unwrap_or(item)
    };
    stripped.trim_start_matches('/').to_string()
}

/// Build the inventory of a local directory tree.
///
/// Every regular file is read and hashed. Directories are skipped and so
/// are symlinks, which are never followed.
pub fn build_local(root: &Path) -> Result<Inventory> {
    if !root.is_dir() {
        return Err(SyncError::validation(format!(
            "local endpoint {} is not a directory",
            root.display()
        )));
    }

    let regulated_root = LocalFs::to_slash(root);
    let mut inventory = Inventory::new();

    for entry in LocalFs::walk(root)? {
        if !entry.is_file() {
            continue;
        }
        let path = relative_path(&regulated_root, &LocalFs::to_slash(&entry.path));
        let digest = hash_file(&entry.path)?;
        inventory.insert(path, digest);
    }

    debug!("Loaded '{}' files from '{}'.", inventory.len(), root.display());
    info!("Loading local files complete.");
    Ok(inventory)
}

/// Path of a listed key relative to a bucket prefix.
///
/// The prefix is matched exactly and must end on a path component
/// boundary; a key that merely shares leading characters with the prefix
/// (`dirty` under `dir`) has no relative path. A key equal to a prefix
/// without a trailing `/` is a single object and keeps its file name.
pub fn remote_relative(prefix: &str, key: &str) -> Option<String> {
    let base = prefix.trim_end_matches('/');
    if base.is_empty() || base == "." {
        let relative = key.trim_start_matches('/');
        return (!relative.is_empty()).then(|| relative.to_string());
    }

    if key == prefix && !key.ends_with('/') {
        return base.rsplit('/').next().map(str::to_string);
    }

    let rest = key.strip_prefix(base)?;
    if !rest.starts_with('/') {
        return None;
    }
    let relative = rest.trim_start_matches('/');
    (!relative.is_empty()).then(|| relative.to_string())
}

/// True when every component of a slash-separated path is a plain name,
/// so joining it under a root can never leave the root
pub fn is_contained(path: &str) -> bool {
    !path.is_empty()
        && path
            .split('/')
            .all(|c| !c.is_empty() && c != "." && c != ".." && !c.contains('\\'))
}

/// Build the inventory of every key under `prefix` in a bucket.
///
/// Pages are requested until one reports no truncation; each follow-up
/// request continues after the last key of the previous page. Keys ending
/// in `/` are directory markers and are skipped, and so are keys whose
/// relative path has `.`, `..` or empty components.
pub async fn build_remote(store: &dyn ObjectStore, prefix: &str, page_size: usize) -> Result<Inventory> {
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let mut inventory = Inventory::new();
    let mut marker: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store
            .list(prefix, marker.as_deref(), page_size)
            .await
            .map_err(|e| SyncError::remote("listing", prefix_label(prefix), e))?;
        pages += 1;

        for entry in &page.entries {
            if entry.key.ends_with('/') {
                continue;
            }
            match remote_relative(prefix, &entry.key) {
                Some(path) if is_contained(&path) => {
                    inventory.insert_key(path, unquote_etag(&entry.etag), entry.key.as_str())
                }
                Some(path) => warn!("Skipping '{}': relative path '{}' is not a plain path.", entry.key, path),
                None => debug!("Skipping '{}': not below prefix '{}'.", entry.key, prefix),
            }
        }

        if !page.truncated {
            break;
        }

        let next = match page.entries.last() {
            Some(last) => last.key.clone(),
            None => {
                return Err(SyncError::Truncated {
                    prefix: prefix.to_string(),
                    marker,
                })
            }
        };
        if marker.as_deref() == Some(next.as_str()) {
            return Err(SyncError::Truncated {
                prefix: prefix.to_string(),
                marker,
            });
        }

        info!("Results truncated, loading additional files via previous last key '{}'.", next);
        marker = Some(next);
    }

    debug!("Loaded '{}' files from S3 in {} page(s).", inventory.len(), pages);
    info!("Loading files from S3 complete.");
    Ok(inventory)
}

fn prefix_label(prefix: &str) -> String {
    if prefix.is_empty() {
        "bucket root".to_string()
    } else {
        format!("prefix '{}'", prefix)
    }
}
