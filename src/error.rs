// Centralized error handling module
// Every stage of a sync run reports failures through SyncError

use std::io;
use std::path::PathBuf;

use crate::fs::backend::StoreError;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Coarse classification of a failure, used for exit reporting and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Io,
    TruncationProtocol,
}

/// Main error type for a sync run
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The sync pair or its configuration is unusable
    #[error("Invalid sync pair: {message}")]
    Validation { message: String },

    /// No known region serves the bucket
    #[error("Bucket '{bucket}' not found in any region")]
    BucketNotFound { bucket: String },

    /// Local filesystem failure
    #[error("I/O error while {operation} {}: {source}", path.display())]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Object store failure (list, get or put)
    #[error("Remote error while {operation} {target}: {source}")]
    Remote {
        operation: String,
        target: String,
        #[source]
        source: StoreError,
    },

    /// A listing claimed more results but gave no way to fetch them
    #[error("Listing of prefix '{prefix}' reported truncation but cannot continue after marker {marker:?}")]
    Truncated {
        prefix: String,
        marker: Option<String>,
    },

    /// A transfer task ended without reporting a result
    #[error("Transfer of '{path}' did not complete: {message}")]
    Task { path: String, message: String },

    /// Configuration file could not be read or parsed
    #[error("Configuration error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl SyncError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a local I/O error with the operation and path that failed
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a remote error with the operation and object that failed
    pub fn remote(operation: impl Into<String>, target: impl Into<String>, source: StoreError) -> Self {
        Self::Remote {
            operation: operation.into(),
            target: target.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::Config { .. } => ErrorKind::Validation,
            Self::BucketNotFound { .. } => ErrorKind::NotFound,
            Self::Io { .. } | Self::Remote { .. } | Self::Task { .. } => ErrorKind::Io,
            Self::Truncated { .. } => ErrorKind::TruncationProtocol,
        }
    }
}
