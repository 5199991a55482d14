//! Exclude pattern matching for inventory entries.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{Result, SyncError};

/// Compiled set of glob patterns. Empty by default: nothing is excluded.
#[derive(Debug, Clone)]
pub struct ExcludePatterns {
    glob_set: GlobSet,
}

impl Default for ExcludePatterns {
    fn default() -> Self {
        Self::new()
    }
}

impl ExcludePatterns {
    pub fn new() -> Self {
        Self {
            glob_set: GlobSet::empty(),
        }
    }

    /// Compile a list of patterns. An invalid glob is a validation error.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|e| {
                SyncError::validation(format!("invalid exclude pattern '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }

        let glob_set = builder
            .build()
            .map_err(|e| SyncError::validation(format!("invalid exclude patterns: {}", e)))?;

        Ok(Self { glob_set })
    }

    pub fn is_empty(&self) -> bool {
        self.glob_set.is_empty()
    }

    /// Check a slash-separated relative path against the whole path, its
    /// file name, and each directory component.
    pub fn is_excluded(&self, path: &str) -> bool {
        if self.is_empty() {
            return false;
        }
        if self.glob_set.is_match(path) {
            return true;
        }
        path.split('/')
            .filter(|component| !component.is_empty())
            .any(|component| self.glob_set.is_match(component))
    }
}
