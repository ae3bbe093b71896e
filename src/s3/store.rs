//! The object-storage collaborator behind the façade

use std::path::Path;

use async_trait::async_trait;

use crate::s3::error::StoreError;
use crate::s3::types::{ConnectionConfig, S3Object};

/// One page of a bucket listing
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<S3Object>,
    /// Token for the next page, `None` on the last one
    pub next_token: Option<String>,
}

/// What the store reports after a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectInfo {
    /// Byte size of the stored object, read back from the store
    pub size: u64,
    pub etag: Option<String>,
}

/// Native operations of an S3-compatible store.
///
/// Each method is a single round trip; implementations must not retry.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    async fn create_bucket(&self, bucket: &str, region: Option<&str>) -> Result<(), StoreError>;

    /// Stream the file at `source` to `bucket/key`
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> Result<PutObjectInfo, StoreError>;

    async fn list_objects_page(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage, StoreError>;

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}

/// Stores that can be built from connection settings
#[async_trait]
pub trait Connect: ObjectStore + Sized {
    async fn connect(config: &ConnectionConfig) -> Result<Self, StoreError>;
}
