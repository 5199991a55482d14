//! Content digests for inventories.
//!
//! Digests are lowercase hex MD5, the same value S3 reports as the entity
//! tag of an object stored with a single put.

use md5::{Digest, Md5};
use std::io::Read;
use std::path::Path;

use crate::error::{Result, SyncError};

/// Length of a hex-encoded digest
pub const DIGEST_LEN: usize = 32;

/// Digest a byte buffer.
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}

/// Digest a file by streaming its content.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| SyncError::io("opening file", path, e))?;
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 65536]; // 64KB buffer

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| SyncError::io("reading file", path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Strip the literal quote characters a store wraps around entity tags.
pub fn unquote_etag(etag: &str) -> &str {
    etag.trim_matches('"')
}
