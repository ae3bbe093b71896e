//! Object-store module
//!
//! This module provides:
//! - [`facade::ObjectStoreFacade`] - connection lifecycle, bucket provisioning, uploads, listing, batch deletes
//! - [`client::S3Client`] - aws-sdk-s3 backed store for S3-compatible endpoints
//! - [`store`] - the store operations the façade is written against
//! - [`types`] and [`error`] - data types and error taxonomy

pub mod client;
pub mod error;
pub mod facade;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use client::S3Client;
pub use error::{FacadeError, FacadeResult, StoreError, UploadErrorKind};
pub use facade::ObjectStoreFacade;
pub use store::{Connect, ObjectPage, ObjectStore, PutObjectInfo};
pub use types::{
    BatchDeleteResult, BucketRef, BucketState, ConnectionConfig, DeleteOutcome, FacadeState,
    ObjectListing, ObjectRef, S3Object, UploadResult,
};
