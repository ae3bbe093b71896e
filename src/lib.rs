//! MinIO task library
//!
//! This crate provides an object-store façade for S3-compatible endpoints
//! together with the settings and logging setup used by the `minio-task` job.

pub mod logging;
pub mod s3;
pub mod settings;
