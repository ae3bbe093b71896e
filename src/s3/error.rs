//! Error types for the object-store façade

use std::fmt;

use thiserror::Error;

use crate::s3::types::FacadeState;

/// Result type returned by façade operations
pub type FacadeResult<T> = std::result::Result<T, FacadeError>;

/// What the store (or the transport in front of it) reported for a single call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Bucket already exists and belongs to the caller
    #[error("bucket already owned by you")]
    AlreadyOwned,

    /// Bucket name is taken by another account
    #[error("bucket name already taken")]
    AlreadyExists,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid bucket name: {0}")]
    InvalidName(String),

    #[error("region mismatch: {0}")]
    RegionMismatch(String),

    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    /// Object key not present
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials rejected by the store
    #[error("credentials rejected: {0}")]
    Credentials(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Network failure, timeout, or an unparseable response
    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("{code}: {message}")]
    Service { code: String, message: String },
}

/// Which way an upload failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorKind {
    /// Local source missing or unreadable
    SourceNotFound,
    /// The store refused or failed the write
    Rejected,
}

impl fmt::Display for UploadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadErrorKind::SourceNotFound => f.write_str("source not found"),
            UploadErrorKind::Rejected => f.write_str("rejected"),
        }
    }
}

/// Errors surfaced to callers of [`crate::s3::ObjectStoreFacade`]
#[derive(Error, Debug, Clone)]
pub enum FacadeError {
    #[error("connect to {endpoint} failed: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: StoreError,
    },

    #[error(
        "create bucket {bucket} failed: {source}{}",
        .check.as_ref().map(|c| format!(" (existence check: {})", c)).unwrap_or_default()
    )]
    CreationFailed {
        bucket: String,
        #[source]
        source: StoreError,
        /// Error from the follow-up existence check, if it failed too
        check: Option<StoreError>,
    },

    #[error("upload {bucket}/{key} failed ({kind}): {reason}")]
    Upload {
        kind: UploadErrorKind,
        bucket: String,
        key: String,
        reason: String,
        #[source]
        source: Option<StoreError>,
    },

    #[error("list {bucket} failed: {source}")]
    List {
        bucket: String,
        #[source]
        source: StoreError,
    },

    #[error("delete {bucket}/{key} failed: {source}")]
    Delete {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("{operation} called while {state}")]
    NotConnected {
        operation: &'static str,
        state: FacadeState,
    },

    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },
}

impl FacadeError {
    pub fn upload_kind(&self) -> Option<UploadErrorKind> {
        match self {
            FacadeError::Upload { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FacadeError::Cancelled { .. })
    }

    pub fn is_not_connected(&self) -> bool {
        matches!(self, FacadeError::NotConnected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_identifiers() {
        let err = FacadeError::Delete {
            bucket: "miniotask".to_string(),
            key: "sample1.txt".to_string(),
            source: StoreError::PermissionDenied("AccessDenied".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("miniotask/sample1.txt"));
        assert!(message.contains("permission denied"));
    }

    #[test]
    fn test_creation_failed_message_includes_existence_check() {
        let err = FacadeError::CreationFailed {
            bucket: "miniotask".to_string(),
            source: StoreError::Transport("connection reset".to_string()),
            check: Some(StoreError::PermissionDenied("AccessDenied".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "create bucket miniotask failed: transport error: connection reset \
             (existence check: permission denied: AccessDenied)"
        );

        let err = FacadeError::CreationFailed {
            bucket: "miniotask".to_string(),
            source: StoreError::AlreadyExists,
            check: None,
        };
        assert_eq!(
            err.to_string(),
            "create bucket miniotask failed: bucket name already taken"
        );
    }

    #[test]
    fn test_not_connected_message() {
        let err = FacadeError::NotConnected {
            operation: "upload",
            state: FacadeState::Closed,
        };
        assert_eq!(err.to_string(), "upload called while closed");
        assert!(err.is_not_connected());
    }

    #[test]
    fn test_upload_kind() {
        let err = FacadeError::Upload {
            kind: UploadErrorKind::SourceNotFound,
            bucket: "b".to_string(),
            key: "k".to_string(),
            reason: "missing".to_string(),
            source: None,
        };
        assert_eq!(err.upload_kind(), Some(UploadErrorKind::SourceNotFound));
        assert_eq!(FacadeError::Cancelled { operation: "list" }.upload_kind(), None);
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;

        let err = FacadeError::List {
            bucket: "b".to_string(),
            source: StoreError::Transport("connection reset".to_string()),
        };
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "transport error: connection reset");
    }
}
