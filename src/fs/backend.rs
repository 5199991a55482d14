use async_trait::async_trait;
use std::sync::Arc;

/// Regions a bucket may live in, probed in this order
pub const KNOWN_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "ca-central-1",
    "sa-east-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-north-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-south-1",
    "us-gov-west-1",
    "us-gov-east-1",
    "cn-north-1",
    "cn-northwest-1",
];

/// Isolated partitions the transport cannot reach with standard credentials
pub const UNSUPPORTED_REGIONS: &[&str] = &[
    "us-gov-west-1",
    "us-gov-east-1",
    "cn-north-1",
    "cn-northwest-1",
];

/// Largest page a single list call may return
pub const MAX_PAGE_SIZE: usize = 1000;

/// Access control applied to uploaded objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Acl {
    #[default]
    Private,
}

/// Fallback content type for uploads with no recognised extension
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// One object returned by a list call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    /// Entity tag as returned by the store, still wrapped in quotes
    pub etag: String,
}

/// One page of a paginated listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub entries: Vec<ObjectEntry>,
    /// More keys follow; continue with the last key of this page as marker
    pub truncated: bool,
}

/// Errors surfaced by an object store
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The bucket is served from another region
    #[error("bucket is not served from region '{region}': {message}")]
    WrongRegion { region: String, message: String },

    #[error("object '{key}' not found")]
    NotFound { key: String },

    #[error("{message}")]
    Transport { message: String },
}

impl StoreError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn is_wrong_region(&self) -> bool {
        matches!(self, StoreError::WrongRegion { .. })
    }
}

/// Object store operations for a single bucket in a single region
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List keys starting with `prefix`, strictly after `marker`.
    /// A `limit` of zero is a placement probe: the call must reach the
    /// bucket but may return no entries.
    async fn list(
        &self,
        prefix: &str,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<ListPage, StoreError>;

    /// Fetch the full content of an object
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Store the full content of an object
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        acl: Acl,
    ) -> Result<(), StoreError>;
}

/// Opens bucket stores for candidate regions
#[async_trait]
pub trait BucketConnector: Send + Sync {
    /// Regions this connector can reach, in probe order
    fn regions(&self) -> Vec<String> {
        KNOWN_REGIONS.iter().map(|r| r.to_string()).collect()
    }

    /// Build a store bound to `bucket` in `region`. Building must not
    /// require the bucket to exist; placement is checked by probing.
    async fn connect(&self, bucket: &str, region: &str) -> Result<Arc<dyn ObjectStore>, StoreError>;
}

/// A bucket whose serving region has been confirmed
#[derive(Clone)]
pub struct BucketHandle {
    pub name: String,
    pub region: String,
    pub store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for BucketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketHandle")
            .field("name", &self.name)
            .field("region", &self.region)
            .finish()
    }
}
