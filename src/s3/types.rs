//! Object-store data types

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::s3::error::{FacadeError, StoreError};

/// Signing region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Content type sent with uploads unless the object overrides it
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Settings needed to reach an S3-compatible endpoint.
///
/// Not serializable, so the secret key never leaves the process.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// `host:port` of the endpoint (a full `http(s)://` URL is accepted too)
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Use TLS when the endpoint carries no scheme
    pub use_ssl: bool,
    /// Signing region, defaults to [`DEFAULT_REGION`]
    pub region: Option<String>,
}

impl ConnectionConfig {
    pub fn new(
        endpoint: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            use_ssl: false,
            region: None,
        }
    }

    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Region requests are signed for
    pub fn signing_region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    /// Build the endpoint URL, adding a scheme from `use_ssl` when the
    /// endpoint is a bare `host:port`.
    pub fn endpoint_url(&self) -> Result<Url, StoreError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(StoreError::InvalidEndpoint("endpoint is empty".to_string()));
        }

        let candidate = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            let scheme = if self.use_ssl { "https" } else { "http" };
            format!("{}://{}", scheme, endpoint)
        };

        let url = Url::parse(&candidate)
            .map_err(|e| StoreError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

        if url.host_str().is_none() {
            return Err(StoreError::InvalidEndpoint(format!("{}: missing host", endpoint)));
        }

        Ok(url)
    }
}

// Keep the secret out of logs.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("use_ssl", &self.use_ssl)
            .field("region", &self.region)
            .finish()
    }
}

/// A bucket, identified by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
    pub region: Option<String>,
}

impl BucketRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

impl fmt::Display for BucketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An object key within a bucket.
///
/// Objects to upload carry a local `source`; objects produced by a listing
/// carry the metadata the store reported instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectRef {
    /// Reference an object without any local data (delete, lookups)
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            source: None,
            content_type: None,
            size: None,
            last_modified: None,
        }
    }

    /// Reference an object to be uploaded from a local file
    pub fn upload(
        bucket: impl Into<String>,
        key: impl Into<String>,
        source: impl AsRef<Path>,
    ) -> Self {
        Self {
            source: Some(source.as_ref().to_path_buf()),
            ..Self::new(bucket, key)
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Build from an entry of a listing page
    pub fn listed(bucket: impl Into<String>, object: S3Object) -> Self {
        Self {
            size: Some(object.size),
            last_modified: object.last_modified,
            ..Self::new(bucket, object.key)
        }
    }

    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// One entry of a listing page as the store reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub storage_class: Option<String>,
}

impl S3Object {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            etag: None,
            storage_class: None,
        }
    }
}

/// Lifecycle of a façade's connection handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacadeState {
    Unconnected,
    Connected,
    /// Terminal
    Closed,
}

impl fmt::Display for FacadeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FacadeState::Unconnected => "unconnected",
            FacadeState::Connected => "connected",
            FacadeState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Outcome of ensuring a bucket exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketState {
    /// The bucket was created by this call
    Created,
    /// The bucket was already there and is reachable with our credentials
    AlreadyExists,
}

impl BucketState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketState::Created => "created",
            BucketState::AlreadyExists => "already exists",
        }
    }
}

/// A successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub bucket: String,
    pub key: String,
    /// Bytes stored, always equal to the local source size
    pub size: u64,
    pub etag: Option<String>,
}

impl UploadResult {
    pub fn size_string(&self) -> String {
        human_size(self.size)
    }
}

/// Per-key outcome of a batch delete
#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    /// Removed, or was not present in the first place
    Deleted,
    Failed(FacadeError),
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

/// Outcome of every key submitted to a batch delete, in submission order
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteResult {
    entries: Vec<(String, DeleteOutcome)>,
}

impl BatchDeleteResult {
    pub(crate) fn record(&mut self, key: String, outcome: DeleteOutcome) {
        self.entries.push((key, outcome));
    }

    pub fn outcome(&self, key: &str) -> Option<&DeleteOutcome> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, outcome)| outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeleteOutcome)> {
        self.entries.iter().map(|(k, o)| (k.as_str(), o))
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, o)| o.is_deleted()).map(|(k, _)| k)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &FacadeError)> {
        self.iter().filter_map(|(k, o)| match o {
            DeleteOutcome::Failed(err) => Some((k, err)),
            DeleteOutcome::Deleted => None,
        })
    }

    pub fn all_deleted(&self) -> bool {
        self.entries.iter().all(|(_, o)| o.is_deleted())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All objects of a bucket at listing time.
///
/// Consumed once; list again to iterate a second time.
#[derive(Debug)]
pub struct ObjectListing {
    objects: std::vec::IntoIter<ObjectRef>,
}

impl ObjectListing {
    pub(crate) fn new(objects: Vec<ObjectRef>) -> Self {
        Self {
            objects: objects.into_iter(),
        }
    }
}

impl Iterator for ObjectListing {
    type Item = ObjectRef;

    fn next(&mut self) -> Option<Self::Item> {
        self.objects.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.objects.size_hint()
    }
}

impl ExactSizeIterator for ObjectListing {}

/// Human-readable byte count
pub fn human_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if size >= TB {
        format!("{:.2} TB", size as f64 / TB as f64)
    } else if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} B", size)
    }
}
