use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{services::S3, ErrorKind, Operator};
use std::sync::Arc;
use tracing::trace;

use crate::fs::backend::{
    Acl, BucketConnector, ListPage, ObjectEntry, ObjectStore, StoreError, KNOWN_REGIONS,
    UNSUPPORTED_REGIONS,
};

/// Region used when an explicit endpoint is configured and no hint is given
pub const DEFAULT_ENDPOINT_REGION: &str = "us-east-1";

/// Static credentials; when absent the default AWS credential chain is used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Temporary STS session token paired with the key above
    pub session_token: Option<String>,
}

/// S3 bucket store backed by OpenDAL
pub struct S3Bucket {
    operator: Operator,
    bucket: String,
    region: String,
}

impl S3Bucket {
    /// Build an operator for `bucket` in `region`.
    ///
    /// Without credentials OpenDAL walks the standard chain:
    /// environment variables, shared credentials file, instance profile.
    pub fn new(
        bucket: &str,
        region: &str,
        endpoint: Option<&str>,
        credentials: Option<&Credentials>,
    ) -> Result<Self, StoreError> {
        let mut builder = S3::default().bucket(bucket).region(region);

        if let Some(endpoint) = endpoint {
            builder = builder.endpoint(endpoint);
        }
        if let Some(creds) = credentials {
            builder = builder
                .access_key_id(&creds.access_key_id)
                .secret_access_key(&creds.secret_access_key);
            if let Some(token) = &creds.session_token {
                builder = builder.session_token(token);
            }
        }

        let operator = Operator::new(builder)
            .map_err(|e| classify(region, bucket, e))?
            .finish();

        Ok(Self {
            operator,
            bucket: bucket.to_string(),
            region: region.to_string(),
        })
    }
}

impl S3Bucket {
    /// The object stored under exactly `key`, if there is one
    async fn exact_object(&self, key: &str) -> Result<Option<ObjectEntry>, StoreError> {
        let meta = match self.operator.stat(key).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(classify(&self.region, key, e)),
        };
        if !meta.mode().is_file() {
            return Ok(None);
        }
        let etag = meta
            .etag()
            .ok_or_else(|| StoreError::transport(format!("object '{}' has no entity tag", key)))?;
        Ok(Some(ObjectEntry {
            key: key.to_string(),
            etag: etag.to_string(),
        }))
    }
}

#[async_trait]
impl ObjectStore for S3Bucket {
    async fn list(
        &self,
        prefix: &str,
        marker: Option<&str>,
        limit: usize,
    ) -> Result<ListPage, StoreError> {
        if limit == 0 {
            self.operator
                .check()
                .await
                .map_err(|e| classify(&self.region, prefix, e))?;
            return Ok(ListPage::default());
        }

        let bare = prefix.trim_start_matches('/');
        let mut entries = Vec::with_capacity(limit);

        // A bare prefix may name one object; it sorts before every key below it
        if marker.is_none() && !bare.is_empty() && !bare.ends_with('/') {
            if let Some(entry) = self.exact_object(bare).await? {
                entries.push(entry);
            }
        }

        // A bare prefix lists as a directory; keys beside it are never wanted
        let prefix = match bare {
            "" => String::new(),
            p if p.ends_with('/') => p.to_string(),
            p => format!("{}/", p),
        };
        let prefix = prefix.as_str();
        let mut request = self.operator.lister_with(prefix).recursive(true).limit(limit);
        if let Some(marker) = marker {
            request = request.start_after(marker);
        }
        let mut lister = request.await.map_err(|e| classify(&self.region, prefix, e))?;

        // Pull one entry past the page to learn whether more keys follow
        let limit = limit + entries.len();
        let mut truncated = false;
        while let Some(entry) = lister
            .try_next()
            .await
            .map_err(|e| classify(&self.region, prefix, e))?
        {
            if entry.metadata().mode().is_dir() {
                continue;
            }
            if entries.len() == limit {
                truncated = true;
                break;
            }
            let etag = entry.metadata().etag().ok_or_else(|| {
                StoreError::transport(format!("listing returned no entity tag for '{}'", entry.path()))
            })?;
            entries.push(ObjectEntry {
                key: entry.path().to_string(),
                etag: etag.to_string(),
            });
        }

        trace!(
            "Listed {} keys under '{}' in s3://{} (truncated: {}).",
            entries.len(),
            prefix,
            self.bucket,
            truncated
        );
        Ok(ListPage { entries, truncated })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let key = key.trim_start_matches('/');
        let content = self
            .operator
            .read(key)
            .await
            .map_err(|e| classify(&self.region, key, e))?;
        Ok(content.to_vec())
    }

    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        acl: Acl,
    ) -> Result<(), StoreError> {
        let key = key.trim_start_matches('/');
        // Objects are written without a canned ACL grant, leaving them private
        match acl {
            Acl::Private => {}
        }
        self.operator
            .write_with(key, data)
            .content_type(content_type)
            .await
            .map_err(|e| classify(&self.region, key, e))?;
        Ok(())
    }
}

/// Map an OpenDAL error onto the store error classes the resolver needs
fn classify(region: &str, key: &str, err: opendal::Error) -> StoreError {
    let message = err.to_string();
    if is_wrong_region_message(&message) {
        return StoreError::WrongRegion {
            region: region.to_string(),
            message,
        };
    }
    match err.kind() {
        ErrorKind::NotFound => StoreError::NotFound {
            key: key.to_string(),
        },
        _ => StoreError::Transport { message },
    }
}

/// S3 answers requests sent to the wrong region with a redirect or a
/// signature-region complaint instead of serving the bucket
fn is_wrong_region_message(message: &str) -> bool {
    const MARKERS: &[&str] = &[
        "PermanentRedirect",
        "AuthorizationHeaderMalformed",
        "IllegalLocationConstraintException",
        "301 Moved Permanently",
        "missing Location header",
    ];
    MARKERS.iter().any(|marker| message.contains(marker))
}

/// Connector producing OpenDAL S3 stores
#[derive(Debug, Clone, Default)]
pub struct S3Connector {
    endpoint: Option<String>,
    credentials: Option<Credentials>,
}

impl S3Connector {
    pub fn new(endpoint: Option<String>, credentials: Option<Credentials>) -> Self {
        Self {
            endpoint,
            credentials,
        }
    }
}

#[async_trait]
impl BucketConnector for S3Connector {
    fn regions(&self) -> Vec<String> {
        // A custom endpoint serves every bucket from one place
        if self.endpoint.is_some() {
            return vec![DEFAULT_ENDPOINT_REGION.to_string()];
        }
        KNOWN_REGIONS
            .iter()
            .filter(|r| !UNSUPPORTED_REGIONS.contains(r))
            .map(|r| r.to_string())
            .collect()
    }

    async fn connect(&self, bucket: &str, region: &str) -> Result<Arc<dyn ObjectStore>, StoreError> {
        let store = S3Bucket::new(
            bucket,
            region,
            self.endpoint.as_deref(),
            self.credentials.as_ref(),
        )?;
        Ok(Arc::new(store))
    }
}
