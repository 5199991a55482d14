//! Layered run configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! command-line flags and environment. Later layers win.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};
use crate::fs::backend::MAX_PAGE_SIZE;
use crate::fs::s3::Credentials;
use crate::sync::engine::{SyncOptions, SyncPair};
use crate::sync::exclude::ExcludePatterns;
use crate::sync::scheduler::DEFAULT_CONCURRENCY;

const CONFIG_DIR: &str = "bucketsync";
const CONFIG_FILE: &str = "config.toml";

/// Contents of a configuration file; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub concurrency: Option<usize>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub page_size: Option<usize>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

/// `<config dir>/bucketsync/config.toml`, when the platform has a config dir
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

impl FileConfig {
    /// Parse TOML text; `path` only labels errors
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SyncError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SyncError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(path, &text)
    }

    /// Load an explicitly named file, or the default one if it exists.
    ///
    /// A missing default file is not an error; a missing explicit one is.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub concurrency: Option<usize>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub page_size: Option<usize>,
    pub exclude: Vec<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub dry_run: bool,
}

/// Fully merged and validated settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub concurrency: usize,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub page_size: usize,
    pub exclude: Vec<String>,
    pub credentials: Option<Credentials>,
    pub dry_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            region: None,
            endpoint: None,
            page_size: MAX_PAGE_SIZE,
            exclude: Vec::new(),
            credentials: None,
            dry_run: false,
        }
    }
}

impl Settings {
    /// Merge the file layer and the override layer over the defaults.
    ///
    /// Exclude patterns accumulate across layers; every other value is
    /// replaced by the highest layer that sets it.
    pub fn merge(file: FileConfig, overrides: Overrides) -> Result<Self> {
        let defaults = Self::default();

        let concurrency = overrides
            .concurrency
            .or(file.concurrency)
            .unwrap_or(defaults.concurrency);
        if concurrency == 0 {
            return Err(SyncError::validation("concurrency must be at least 1"));
        }

        let page_size = overrides.page_size.or(file.page_size).unwrap_or(defaults.page_size);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(SyncError::validation(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, page_size
            )));
        }

        let access_key_id = overrides.access_key_id.or(file.access_key_id);
        let secret_access_key = overrides.secret_access_key.or(file.secret_access_key);
        let session_token = overrides
            .session_token
            .or(file.session_token)
            .filter(|t| !t.is_empty());
        let credentials = match (access_key_id, secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(Credentials {
                access_key_id,
                secret_access_key,
                session_token,
            }),
            // A lone token belongs to the default credential chain
            (None, None) => None,
            _ => {
                return Err(SyncError::validation(
                    "access key id and secret access key must be given together",
                ))
            }
        };

        let mut exclude = file.exclude;
        exclude.extend(overrides.exclude);

        Ok(Self {
            concurrency,
            region: overrides.region.or(file.region).filter(|r| !r.is_empty()),
            endpoint: overrides.endpoint.or(file.endpoint).filter(|e| !e.is_empty()),
            page_size,
            exclude,
            credentials,
            dry_run: overrides.dry_run,
        })
    }

    pub fn sync_pair(&self, source: &str, target: &str) -> SyncPair {
        SyncPair::new(source, target)
            .with_concurrency(self.concurrency)
            .with_region(self.region.clone())
    }

    pub fn sync_options(&self) -> Result<SyncOptions> {
        Ok(SyncOptions {
            page_size: self.page_size,
            exclude: ExcludePatterns::from_patterns(&self.exclude)?,
            dry_run: self.dry_run,
        })
    }
}
