use std::fmt;
use std::path::{Path, PathBuf};

/// URI scheme marking a remote bucket reference
pub const REMOTE_SCHEME: &str = "s3://";

/// Reference to a bucket and a key prefix inside it (`s3://bucket/key...`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub bucket: String,
    pub prefix: String,
}

impl RemoteRef {
    /// Parse a remote reference. Returns `None` when the scheme marker is
    /// missing or no bucket name follows it.
    pub fn parse(url: &str) -> Option<Self> {
        let rest = url.strip_prefix(REMOTE_SCHEME)?;
        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key),
            None => (rest, ""),
        };

        if bucket.is_empty() {
            return None;
        }

        Some(Self {
            bucket: bucket.to_string(),
            prefix: key.trim_start_matches('/').to_string(),
        })
    }

    /// Object key for a path relative to this reference's prefix
    pub fn key_for(&self, relative: &str) -> String {
        anchor(&self.prefix, relative)
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", REMOTE_SCHEME, self.bucket, self.prefix)
    }
}

/// True when `path` carries the remote scheme marker
pub fn is_remote_url(path: &str) -> bool {
    path.starts_with(REMOTE_SCHEME)
}

/// One side of a sync pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Local(PathBuf),
    Remote(RemoteRef),
}

impl Endpoint {
    /// Classify an endpoint string. Anything without the remote scheme is a
    /// local path; its existence is checked separately at validation time.
    pub fn parse(raw: &str) -> Option<Self> {
        if is_remote_url(raw) {
            RemoteRef::parse(raw).map(Endpoint::Remote)
        } else {
            Some(Endpoint::Local(PathBuf::from(raw)))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Endpoint::Remote(_))
    }

    pub fn as_remote(&self) -> Option<&RemoteRef> {
        match self {
            Endpoint::Remote(remote) => Some(remote),
            Endpoint::Local(_) => None,
        }
    }

    pub fn as_local(&self) -> Option<&Path> {
        match self {
            Endpoint::Local(path) => Some(path),
            Endpoint::Remote(_) => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Local(path) => write!(f, "{}", path.display()),
            Endpoint::Remote(remote) => write!(f, "{}", remote),
        }
    }
}

/// Join a relative path under a key prefix. Leading separators are stripped
/// after joining so an empty prefix never yields a key starting with `/`.
pub fn anchor(prefix: &str, relative: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() || prefix == "." {
        return relative.trim_start_matches('/').to_string();
    }
    format!("{}/{}", prefix, relative.trim_start_matches('/'))
        .trim_start_matches('/')
        .to_string()
}

/// Location of one item on either side of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Path(PathBuf),
    Key(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Path(path) => write!(f, "{}", path.display()),
            Locator::Key(key) => write!(f, "{}", key),
        }
    }
}
