use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use crate::error::{Result, SyncError};

/// Permissions for directories created while downloading
pub const DIR_MODE: u32 = 0o755;

/// Permissions for files written while downloading
pub const FILE_MODE: u32 = 0o644;

/// One item found while walking a local tree
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    pub is_symlink: bool,
}

impl WalkEntry {
    pub fn is_file(&self) -> bool {
        !self.is_dir && !self.is_symlink
    }
}

pub struct LocalFs;

impl LocalFs {
    pub fn exists(path: &Path) -> bool {
        fs::metadata(path).is_ok()
    }

    /// Walk `root` recursively without following symlinks.
    /// Entries come back sorted by path within each directory.
    pub fn walk(root: &Path) -> Result<Vec<WalkEntry>> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .skip_hidden(false)
            .sort(true)
        {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                SyncError::io("walking", path, io::Error::other(e.to_string()))
            })?;
            let file_type = entry.file_type();

            entries.push(WalkEntry {
                path: entry.path(),
                is_dir: file_type.is_dir(),
                is_symlink: file_type.is_symlink(),
            });
        }

        Ok(entries)
    }

    pub async fn read(path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| SyncError::io("reading file", path, e))
    }

    /// Create `path` and all missing parents
    pub async fn make_dirs(path: &Path) -> Result<()> {
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIR_MODE);

        builder
            .create(path)
            .await
            .map_err(|e| SyncError::io("creating directory", path, e))
    }

    /// Write the whole file, replacing any previous content
    pub async fn write(path: &Path, data: &[u8], mode: u32) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;

        let mut file = options
            .open(path)
            .await
            .map_err(|e| SyncError::io("creating file", path, e))?;
        file.write_all(data)
            .await
            .map_err(|e| SyncError::io("writing file", path, e))?;
        file.flush()
            .await
            .map_err(|e| SyncError::io("writing file", path, e))?;

        Ok(())
    }

    /// Convert a path to the slash-separated form used in inventories
    pub fn to_slash(path: &Path) -> String {
        let raw = path.to_string_lossy();
        if cfg!(windows) {
            raw.replace('\\', "/")
        } else {
            raw.into_owned()
        }
    }
}
