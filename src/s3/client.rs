//! AWS S3 client wrapper

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use url::Url;

use crate::s3::error::StoreError;
use crate::s3::store::{Connect, ObjectPage, ObjectStore, PutObjectInfo};
use crate::s3::types::{ConnectionConfig, S3Object, DEFAULT_REGION};

/// Name reported by the static credentials provider
const CREDENTIALS_PROVIDER: &str = "minio-task";

/// Keys per listing page, the S3 maximum
pub const DEFAULT_PAGE_SIZE: i32 = 1000;

/// S3 client bound to one S3-compatible endpoint
pub struct S3Client {
    client: Client,
    current_region: String,
    endpoint: Url,
    page_size: i32,
}

impl S3Client {
    /// Create a client for a custom endpoint with static credentials.
    ///
    /// No request is sent; unreachable endpoints and rejected credentials
    /// show up on the first call.
    pub async fn with_config(config: &ConnectionConfig) -> Result<Self, StoreError> {
        let endpoint = config.endpoint_url()?;

        if config.access_key_id.is_empty() || config.secret_access_key.is_empty() {
            return Err(StoreError::Credentials(
                "access key id and secret access key are required".to_string(),
            ));
        }

        let current_region = config.signing_region().to_string();
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(endpoint.as_str().trim_end_matches('/'))
            .region(Region::new(current_region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        // MinIO and most self-hosted stores only serve path-style requests
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        tracing::debug!(
            "S3 client configured for {} (region {})",
            endpoint,
            current_region
        );

        Ok(Self {
            client: Client::from_conf(s3_config),
            current_region,
            endpoint,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Set the number of keys requested per listing page
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size.clamp(1, DEFAULT_PAGE_SIZE);
        self
    }

    pub fn page_size(&self) -> i32 {
        self.page_size
    }

    /// Size of a stored object as the store reports it
    pub async fn object_size(&self, bucket: &str, key: &str) -> Result<u64, StoreError> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    StoreError::NotFound(format!("{}/{}", bucket, key))
                } else {
                    classify(err)
                }
            })?;

        Ok(response.content_length().unwrap_or(0).max(0) as u64)
    }

    /// Get the signing region
    pub fn region(&self) -> &str {
        &self.current_region
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Connect for S3Client {
    async fn connect(config: &ConnectionConfig) -> Result<Self, StoreError> {
        Self::with_config(config).await
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    Ok(false)
                } else {
                    Err(classify(err))
                }
            }
        }
    }

    async fn create_bucket(&self, bucket: &str, region: Option<&str>) -> Result<(), StoreError> {
        let mut request = self.client.create_bucket().bucket(bucket);

        // us-east-1 must not be sent as a location constraint
        if let Some(region) = region.filter(|r| *r != DEFAULT_REGION) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        request.send().await.map_err(classify)?;
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> Result<PutObjectInfo, StoreError> {
        let size = tokio::fs::metadata(source)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", source.display(), e)))?
            .len();

        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", source.display(), e)))?;

        let response = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(body)
            .send()
            .await
            .map_err(classify)?;

        Ok(PutObjectInfo {
            size: self.object_size(bucket, key).await?,
            etag: response.e_tag().map(|s| s.to_string()),
        })
    }

    async fn list_objects_page(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage, StoreError> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(self.page_size);

        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let response = request.send().await.map_err(classify)?;

        let objects = response
            .contents()
            .iter()
            .map(|obj| S3Object {
                key: obj.key().unwrap_or_default().to_string(),
                size: obj.size().unwrap_or(0).max(0) as u64,
                last_modified: obj.last_modified().map(|d| {
                    chrono::DateTime::from_timestamp(d.secs(), d.subsec_nanos())
                        .unwrap_or_default()
                }),
                etag: obj.e_tag().map(|s| s.to_string()),
                storage_class: obj.storage_class().map(|s| s.as_str().to_string()),
            })
            .collect();

        // Some stores leave the token set on the last page
        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(|s| s.to_string())
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_token,
        })
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;

        Ok(())
    }
}

/// Map an SDK failure onto the store error taxonomy
fn classify<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();

    match &err {
        SdkError::ServiceError(context) => {
            let code = context.err().code().unwrap_or_default();
            classify_code(code, message)
        }
        _ => StoreError::Transport(message),
    }
}

fn classify_code(code: &str, message: String) -> StoreError {
    match code {
        "BucketAlreadyOwnedByYou" => StoreError::AlreadyOwned,
        "BucketAlreadyExists" => StoreError::AlreadyExists,
        "AccessDenied" | "AllAccessDisabled" => StoreError::PermissionDenied(message),
        "InvalidBucketName" => StoreError::InvalidName(message),
        "IllegalLocationConstraintException"
        | "InvalidLocationConstraint"
        | "AuthorizationHeaderMalformed"
        | "InvalidRegion" => StoreError::RegionMismatch(message),
        "NoSuchBucket" => StoreError::NoSuchBucket(message),
        "NoSuchKey" | "NotFound" => StoreError::NotFound(message),
        "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken" => {
            StoreError::Credentials(message)
        }
        "" => StoreError::Transport(message),
        other => StoreError::Service {
            code: other.to_string(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_code_bucket_conflicts() {
        assert_eq!(
            classify_code("BucketAlreadyOwnedByYou", String::new()),
            StoreError::AlreadyOwned
        );
        assert_eq!(
            classify_code("BucketAlreadyExists", String::new()),
            StoreError::AlreadyExists
        );
    }

    #[test]
    fn test_classify_code_keeps_message() {
        match classify_code("AccessDenied", "denied on miniotask".to_string()) {
            StoreError::PermissionDenied(message) => assert_eq!(message, "denied on miniotask"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            classify_code("InvalidBucketName", String::new()),
            StoreError::InvalidName(_)
        ));
        assert!(matches!(
            classify_code("IllegalLocationConstraintException", String::new()),
            StoreError::RegionMismatch(_)
        ));
        assert!(matches!(
            classify_code("SignatureDoesNotMatch", String::new()),
            StoreError::Credentials(_)
        ));
    }

    #[test]
    fn test_classify_code_unknown() {
        assert_eq!(
            classify_code("SlowDown", "reduce your request rate".to_string()),
            StoreError::Service {
                code: "SlowDown".to_string(),
                message: "reduce your request rate".to_string(),
            }
        );
        assert!(matches!(
            classify_code("", String::new()),
            StoreError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn test_with_config_rejects_bad_endpoint() {
        let config = ConnectionConfig::new("", "ak", "sk");
        assert!(matches!(
            S3Client::with_config(&config).await,
            Err(StoreError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_with_config_requires_credentials() {
        let config = ConnectionConfig::new("localhost:9000", "", "");
        assert!(matches!(
            S3Client::with_config(&config).await,
            Err(StoreError::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_with_config_region() {
        let config = ConnectionConfig::new("localhost:9000", "ak", "sk").with_region("eu-west-1");
        let client = S3Client::with_config(&config).await.unwrap();
        assert_eq!(client.region(), "eu-west-1");
        assert_eq!(client.endpoint().port(), Some(9000));

        let config = ConnectionConfig::new("localhost:9000", "ak", "sk");
        let client = S3Client::with_config(&config).await.unwrap();
        assert_eq!(client.region(), DEFAULT_REGION);
    }

    #[tokio::test]
    async fn test_page_size_is_bounded() {
        let config = ConnectionConfig::new("localhost:9000", "ak", "sk");
        let client = S3Client::with_config(&config).await.unwrap();
        assert_eq!(client.page_size(), DEFAULT_PAGE_SIZE);

        let client = client.with_page_size(10);
        assert_eq!(client.page_size(), 10);

        assert_eq!(client.with_page_size(0).page_size(), 1);
    }
}
