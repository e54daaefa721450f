//! Object storage seam and the S3 backend behind it
use crate::config::StorageConfig;
use crate::error::StorageError;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;

pub const DEFAULT_REGION: &str = "us-east-1";

const CREDENTIALS_PROVIDER: &str = "field-imagery";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub content_length: u64,
}

/// The three storage operations the pipeline relies on. Creating a bucket that
/// already exists is reported as [`BucketStatus::AlreadyExists`], never as an error.
pub trait ObjectStore {
    async fn create_bucket(self: &Self, bucket: &str) -> Result<BucketStatus, StorageError>;

    async fn put_object(self: &Self, bucket: &str, key: &str, body: Bytes)
        -> Result<(), StorageError>;

    /// Metadata-only existence check. A missing key is [`StorageError::NotFound`].
    async fn head_object(self: &Self, bucket: &str, key: &str) -> Result<ObjectHead, StorageError>;
}

pub async fn client_from_config(config: &StorageConfig) -> Client {
    let credentials = Credentials::new(
        &config.access_key_id,
        &config.secret_access_key,
        None,
        None,
        CREDENTIALS_PROVIDER,
    );
    let base_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials)
        .load()
        .await;

    // S3-compatible stores (MinIO, LocalStack) generally need path-style addressing
    let mut builder = aws_sdk_s3::config::Builder::from(&base_config);
    if let Some(endpoint) = &config.endpoint_url {
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }

    Client::from_conf(builder.build())
}

pub struct S3Store {
    client: Client,
    region: String,
}

impl S3Store {
    pub fn new(client: Client, region: &str) -> Self {
        Self {
            client,
            region: region.to_string(),
        }
    }

    pub async fn from_config(config: &StorageConfig) -> Self {
        let client = client_from_config(config).await;
        Self::new(client, &config.region)
    }

    fn bucket_configuration(self: &Self) -> Option<CreateBucketConfiguration> {
        // us-east-1 rejects an explicit location constraint
        if self.region == DEFAULT_REGION {
            return None;
        }
        let constraint = BucketLocationConstraint::from(self.region.as_str());
        Some(
            CreateBucketConfiguration::builder()
                .location_constraint(constraint)
                .build(),
        )
    }
}

impl ObjectStore for S3Store {
    async fn create_bucket(self: &Self, bucket: &str) -> Result<BucketStatus, StorageError> {
        let result = self
            .client
            .create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(self.bucket_configuration())
            .send()
            .await;

        match result {
            Ok(_) => Ok(BucketStatus::Created),
            Err(err) => match err.as_service_error() {
                Some(e) if e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists() => {
                    Ok(BucketStatus::AlreadyExists)
                }
                _ => Err(StorageError::Backend(DisplayErrorContext(&err).to_string())),
            },
        }
    }

    async fn put_object(
        self: &Self,
        bucket: &str,
        key: &str,
        body: Bytes,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| match err.as_service_error().and_then(|e| e.code()) {
                Some("NoSuchBucket") => StorageError::NoSuchBucket(bucket.to_string()),
                _ => StorageError::Backend(DisplayErrorContext(&err).to_string()),
            })?;
        Ok(())
    }

    async fn head_object(self: &Self, bucket: &str, key: &str) -> Result<ObjectHead, StorageError> {
        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match err.as_service_error() {
                Some(e) if e.is_not_found() => StorageError::NotFound(key.to_string()),
                _ => StorageError::Backend(DisplayErrorContext(&err).to_string()),
            })?;

        let content_length = head
            .content_length()
            .and_then(|len| u64::try_from(len).ok())
            .unwrap_or_default();
        Ok(ObjectHead { content_length })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_config(region: &str) -> StorageConfig {
        StorageConfig {
            region: region.to_string(),
            endpoint_url: Some("http://127.0.0.1:9000".to_string()),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_no_location_constraint_in_default_region() {
        let store = S3Store::from_config(&storage_config(DEFAULT_REGION)).await;
        assert!(store.bucket_configuration().is_none());
    }

    #[tokio::test]
    async fn test_location_constraint_outside_default_region() {
        let store = S3Store::from_config(&storage_config("eu-west-1")).await;
        let configuration = store.bucket_configuration().unwrap();
        assert_eq!(
            configuration.location_constraint(),
            Some(&BucketLocationConstraint::EuWest1)
        );
    }

    /// Needs an S3-compatible server, e.g. `docker run -p 9000:9000 minio/minio server /data`
    #[tokio::test]
    #[ignore]
    async fn test_live_round_trip() {
        let store = S3Store::from_config(&storage_config(DEFAULT_REGION)).await;
        let bucket = "field-imagery-smoke-test";

        store.create_bucket(bucket).await.unwrap();
        let status = store.create_bucket(bucket).await.unwrap();
        assert_eq!(status, BucketStatus::AlreadyExists);

        store
            .put_object(bucket, "F1/2023-06-15_imagery.png", Bytes::from_static(b"IMG"))
            .await
            .unwrap();
        let head = store
            .head_object(bucket, "F1/2023-06-15_imagery.png")
            .await
            .unwrap();
        assert_eq!(head.content_length, 3);

        let missing = store.head_object(bucket, "never/written.png").await;
        assert!(matches!(missing, Err(StorageError::NotFound(_))));
    }
}
