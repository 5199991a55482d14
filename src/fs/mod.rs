pub mod backend;
pub mod local;
pub mod s3;
pub mod types;

pub use backend::{BucketConnector, BucketHandle, ListPage, ObjectEntry, ObjectStore, StoreError};
pub use local::LocalFs;
pub use s3::{Credentials, S3Connector};
pub use types::*;
