//! MinIO task
//!
//! Connects to an S3-compatible store, makes sure the job bucket exists,
//! uploads the sample files, lists the bucket and deletes one object.
//!
//! Usage: `minio-task [config.env]`

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use minio_task::logging;
use minio_task::s3::{BucketRef, FacadeError, ObjectRef, ObjectStoreFacade, S3Client};
use minio_task::settings::{Settings, DEFAULT_CONFIG_FILE};

/// (object key, local file) pairs uploaded by the job
const UPLOADS: [(&str, &str); 2] = [
    ("sample1.txt", "testdata/sample1.txt"),
    ("sample2.txt", "testdata/sample2.txt"),
];

/// Keys removed at the end of the job
const DELETES: [&str; 1] = ["sample1.txt"];

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(&logging::log_path())?;

    tracing::info!("Starting MinIO task v{}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let span = tracing::info_span!("app", app = env!("CARGO_PKG_NAME"));
    let result = run(&config_path).instrument(span).await;

    // Façade errors were logged where they happened
    if let Err(e) = &result {
        if e.downcast_ref::<FacadeError>().is_none() {
            tracing::error!("MinIO task failed: {:#}", e);
        }
    }
    result
}

async fn run(config_path: &Path) -> Result<()> {
    let settings = Settings::load(config_path)?;

    let mut facade = ObjectStoreFacade::<S3Client>::connect(settings.connection.clone())
        .await
        .context("Failed to connect to the object store")?;

    // Ctrl-C stops the job at the next checkpoint
    let cancel = CancellationToken::new();
    facade.set_cancellation(cancel.clone());
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping at the next checkpoint");
                cancel.cancel();
            }
        }
    });

    let mut bucket = BucketRef::new(&settings.bucket);
    if let Some(region) = &settings.bucket_region {
        bucket = bucket.with_region(region);
    }

    let state = facade
        .ensure_bucket(&bucket)
        .await
        .with_context(|| format!("Failed to set up bucket {}", bucket))?;
    tracing::debug!("Bucket {} {}", bucket, state.as_str());

    // A failed upload does not stop the rest of the job
    let mut failed_uploads = 0;
    for (key, path) in UPLOADS {
        let object = ObjectRef::upload(&bucket.name, key, path);
        match facade.upload(&bucket, &object).await {
            Ok(_) => {}
            Err(e) if e.is_cancelled() => return Err(e.into()),
            Err(_) => failed_uploads += 1,
        }
    }

    if let Ok(listing) = facade.list(&bucket).await {
        let files: Vec<String> = listing.map(|o| o.key).collect();
        tracing::info!(
            files = %serde_json::to_string(&files)?,
            "Listing files"
        );
    }

    let report = facade.delete_many(&bucket, DELETES).await?;
    if report.all_deleted() {
        let deleted: Vec<&str> = report.succeeded().collect();
        tracing::info!(files = %serde_json::to_string(&deleted)?, "Files deleted successfully");
    } else {
        for (key, err) in report.failed() {
            tracing::warn!(key, "Not deleted: {}", err);
        }
    }

    facade.close();

    if failed_uploads > 0 {
        bail!("{} of {} uploads failed", failed_uploads, UPLOADS.len());
    }
    Ok(())
}
