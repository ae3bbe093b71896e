//! Object-store façade
//!
//! [`ObjectStoreFacade`] owns one connection handle and exposes the handful of
//! operations a batch job needs:
//! - idempotent bucket provisioning ([`ObjectStoreFacade::ensure_bucket`])
//! - single-file upload with a size check ([`ObjectStoreFacade::upload`])
//! - complete listings ([`ObjectStoreFacade::list`])
//! - all-effort batch deletion ([`ObjectStoreFacade::delete_many`])
//!
//! Failures are never retried here. Cancellation is checked before every
//! store call, between listing pages and between the keys of a batch.

use std::collections::HashSet;
use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::s3::error::{FacadeError, FacadeResult, StoreError, UploadErrorKind};
use crate::s3::store::{Connect, ObjectStore};
use crate::s3::types::{
    BatchDeleteResult, BucketRef, BucketState, ConnectionConfig, DeleteOutcome, FacadeState,
    ObjectListing, ObjectRef, UploadResult,
};

enum Handle<S> {
    Unconnected,
    Connected(S),
    Closed,
}

/// Narrow surface over an object store
pub struct ObjectStoreFacade<S> {
    config: Option<ConnectionConfig>,
    handle: Handle<S>,
    cancel: CancellationToken,
}

impl<S: Connect> ObjectStoreFacade<S> {
    /// Build a façade and connect it in one step
    pub async fn connect(config: ConnectionConfig) -> FacadeResult<Self> {
        let mut facade = Self::new(config);
        facade.open().await?;
        Ok(facade)
    }

    /// Establish the connection handle of an unconnected façade.
    ///
    /// Calling this on a connected façade is a no-op; a closed one stays closed.
    pub async fn open(&mut self) -> FacadeResult<()> {
        match self.handle {
            Handle::Connected(_) => return Ok(()),
            Handle::Closed => return Err(report(self.not_connected("connect"))),
            Handle::Unconnected => {}
        }

        let Some(config) = self.config.as_ref() else {
            return Err(report(self.not_connected("connect")));
        };

        match S::connect(config).await {
            Ok(store) => {
                tracing::info!(
                    endpoint = %config.endpoint,
                    region = config.signing_region(),
                    tls = config.use_ssl,
                    "Object store client connected"
                );
                self.handle = Handle::Connected(store);
                Ok(())
            }
            Err(source) => Err(report(FacadeError::Connection {
                endpoint: config.endpoint.clone(),
                source,
            })),
        }
    }
}

impl<S: ObjectStore> ObjectStoreFacade<S> {
    /// An unconnected façade; call `open` before using it
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config: Some(config),
            handle: Handle::Unconnected,
            cancel: CancellationToken::new(),
        }
    }

    /// A connected façade around an existing store handle
    pub fn attach(store: S) -> Self {
        Self {
            config: None,
            handle: Handle::Connected(store),
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> FacadeState {
        match self.handle {
            Handle::Unconnected => FacadeState::Unconnected,
            Handle::Connected(_) => FacadeState::Connected,
            Handle::Closed => FacadeState::Closed,
        }
    }

    pub fn config(&self) -> Option<&ConnectionConfig> {
        self.config.as_ref()
    }

    /// Borrow the store handle while connected
    pub fn store(&self) -> Option<&S> {
        match &self.handle {
            Handle::Connected(store) => Some(store),
            _ => None,
        }
    }

    /// Install the token checked at every cancellation checkpoint
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    /// The token currently checked at cancellation checkpoints
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Release the connection handle. Terminal.
    pub fn close(&mut self) {
        if matches!(self.handle, Handle::Connected(_)) {
            tracing::info!("Object store client closed");
        }
        self.handle = Handle::Closed;
    }

    /// Create the bucket, treating "already owned by us" as success.
    ///
    /// When the store answers a create with an error that does not say whether
    /// we own the bucket, a follow-up existence check decides. A bucket that is
    /// visible to our credentials counts as ours.
    pub async fn ensure_bucket(&self, bucket: &BucketRef) -> FacadeResult<BucketState> {
        const OP: &str = "ensure_bucket";
        let store = self.connected(OP)?;

        let created = self
            .guarded(OP, store.create_bucket(&bucket.name, bucket.region.as_deref()))
            .await?;

        let state = match created {
            Ok(()) => BucketState::Created,
            Err(StoreError::AlreadyOwned) => BucketState::AlreadyExists,
            Err(
                source @ (StoreError::AlreadyExists
                | StoreError::InvalidName(_)
                | StoreError::RegionMismatch(_)),
            ) => {
                return Err(report(FacadeError::CreationFailed {
                    bucket: bucket.name.clone(),
                    source,
                    check: None,
                }));
            }
            Err(source) => {
                tracing::debug!(
                    bucket = %bucket.name,
                    "Create bucket failed ({}), checking whether it already exists",
                    source
                );
                match self.guarded(OP, store.bucket_exists(&bucket.name)).await? {
                    Ok(true) => BucketState::AlreadyExists,
                    Ok(false) => {
                        return Err(report(FacadeError::CreationFailed {
                            bucket: bucket.name.clone(),
                            source,
                            check: None,
                        }));
                    }
                    Err(check) => {
                        return Err(report(FacadeError::CreationFailed {
                            bucket: bucket.name.clone(),
                            source,
                            check: Some(check),
                        }));
                    }
                }
            }
        };

        match state {
            BucketState::Created => {
                tracing::info!(bucket = %bucket.name, "Successfully created the bucket")
            }
            BucketState::AlreadyExists => {
                tracing::info!(bucket = %bucket.name, "We already own the bucket")
            }
        }

        Ok(state)
    }

    /// Upload a local file under `object.key`
    pub async fn upload(&self, bucket: &BucketRef, object: &ObjectRef) -> FacadeResult<UploadResult> {
        const OP: &str = "upload";
        let store = self.connected(OP)?;
        self.checkpoint(OP)?;

        let upload_error = |kind, reason: String, source| {
            report(FacadeError::Upload {
                kind,
                bucket: bucket.name.clone(),
                key: object.key.clone(),
                reason,
                source,
            })
        };

        if object.bucket != bucket.name {
            return Err(upload_error(
                UploadErrorKind::Rejected,
                format!("object is addressed to bucket {}", object.bucket),
                None,
            ));
        }

        let Some(source_path) = object.source.as_deref() else {
            return Err(upload_error(
                UploadErrorKind::SourceNotFound,
                "no local source given".to_string(),
                None,
            ));
        };

        let local_size = match tokio::fs::metadata(source_path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => {
                return Err(upload_error(
                    UploadErrorKind::SourceNotFound,
                    format!("{} is not a regular file", source_path.display()),
                    None,
                ));
            }
            Err(e) => {
                return Err(upload_error(
                    UploadErrorKind::SourceNotFound,
                    format!("{}: {}", source_path.display(), e),
                    None,
                ));
            }
        };

        self.checkpoint(OP)?;

        let put = self
            .guarded(
                OP,
                store.put_object(&bucket.name, &object.key, source_path, object.content_type()),
            )
            .await?;

        let info = match put {
            Ok(info) => info,
            Err(source) => {
                return Err(upload_error(
                    UploadErrorKind::Rejected,
                    "store rejected the write".to_string(),
                    Some(source),
                ));
            }
        };

        if info.size != local_size {
            return Err(upload_error(
                UploadErrorKind::Rejected,
                format!("stored {} bytes, source has {}", info.size, local_size),
                None,
            ));
        }

        let result = UploadResult {
            bucket: bucket.name.clone(),
            key: object.key.clone(),
            size: info.size,
            etag: info.etag,
        };

        tracing::info!(
            bucket = %result.bucket,
            key = %result.key,
            size = result.size,
            "Successfully uploaded file ({})",
            result.size_string()
        );

        Ok(result)
    }

    /// Every object in the bucket, fetched page by page in store order.
    ///
    /// A failing page fails the whole call; no partial listing is returned.
    pub async fn list(&self, bucket: &BucketRef) -> FacadeResult<ObjectListing> {
        const OP: &str = "list";
        let store = self.connected(OP)?;

        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            self.checkpoint(OP)?;

            let page = match self
                .guarded(OP, store.list_objects_page(&bucket.name, token.as_deref()))
                .await?
            {
                Ok(page) => page,
                Err(source) => {
                    return Err(report(FacadeError::List {
                        bucket: bucket.name.clone(),
                        source,
                    }));
                }
            };

            pages += 1;
            objects.extend(
                page.objects
                    .into_iter()
                    .map(|object| ObjectRef::listed(bucket.name.clone(), object)),
            );

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        tracing::info!(
            bucket = %bucket.name,
            objects = objects.len(),
            pages,
            "Listed bucket"
        );

        Ok(ObjectListing::new(objects))
    }

    /// Delete each key in order, continuing past failures.
    ///
    /// Keys the store does not have count as deleted. Repeated keys are
    /// attempted once. If cancelled midway, the keys not yet attempted are
    /// reported as cancelled.
    pub async fn delete_many<I, K>(&self, bucket: &BucketRef, keys: I) -> FacadeResult<BatchDeleteResult>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        const OP: &str = "delete_many";
        let store = self.connected(OP)?;

        let mut seen = HashSet::new();
        let mut result = BatchDeleteResult::default();

        for key in keys.into_iter().map(Into::into) {
            if !seen.insert(key.clone()) {
                continue;
            }

            let removed = match self.checkpoint(OP) {
                Ok(()) => match self.guarded(OP, store.remove_object(&bucket.name, &key)).await {
                    Ok(removed) => removed,
                    Err(cancelled) => {
                        result.record(key, DeleteOutcome::Failed(cancelled));
                        continue;
                    }
                },
                Err(cancelled) => {
                    result.record(key, DeleteOutcome::Failed(cancelled));
                    continue;
                }
            };

            let outcome = match removed {
                Ok(()) => {
                    tracing::debug!(bucket = %bucket.name, key = %key, "Deleted object");
                    DeleteOutcome::Deleted
                }
                Err(StoreError::NotFound(_)) => {
                    tracing::debug!(bucket = %bucket.name, key = %key, "Object already absent");
                    DeleteOutcome::Deleted
                }
                Err(source) => DeleteOutcome::Failed(report(FacadeError::Delete {
                    bucket: bucket.name.clone(),
                    key: key.clone(),
                    source,
                })),
            };
            result.record(key, outcome);
        }

        tracing::info!(
            bucket = %bucket.name,
            deleted = result.succeeded().count(),
            failed = result.failed().count(),
            "Batch delete finished"
        );

        Ok(result)
    }

    fn connected(&self, operation: &'static str) -> FacadeResult<&S> {
        match &self.handle {
            Handle::Connected(store) => Ok(store),
            _ => Err(report(self.not_connected(operation))),
        }
    }

    fn not_connected(&self, operation: &'static str) -> FacadeError {
        FacadeError::NotConnected {
            operation,
            state: self.state(),
        }
    }

    fn checkpoint(&self, operation: &'static str) -> FacadeResult<()> {
        if self.cancel.is_cancelled() {
            Err(report(FacadeError::Cancelled { operation }))
        } else {
            Ok(())
        }
    }

    /// Run one store call, giving up if the token fires first
    async fn guarded<T, F>(&self, operation: &'static str, call: F) -> FacadeResult<Result<T, StoreError>>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(report(FacadeError::Cancelled { operation })),
            result = call => Ok(result),
        }
    }
}

/// Emit the error event for a failed operation
fn report(err: FacadeError) -> FacadeError {
    tracing::error!("{}", err);
    err
}
