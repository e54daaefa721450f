use crate::s3::ObjectStore;
use crate::verify::verify_upload;
use bytes::Bytes;
use chrono::NaiveDate;
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info};

/// `{field_id}/{date}_imagery.png`. Re-running a date overwrites the same key.
pub fn object_key(field_id: &str, date: NaiveDate) -> String {
    format!("{}/{}_imagery.png", field_id, date.format("%Y-%m-%d"))
}

/// Result of one upload. `verified` is an independent signal: a stored object
/// whose verification failed is still `Stored`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UploadOutcome {
    Stored { key: String, verified: bool },
    Failed { key: String, error: String },
}

impl UploadOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, UploadOutcome::Stored { .. })
    }
}

pub async fn upload_image(
    store: &impl ObjectStore,
    bucket: &str,
    payload: Bytes,
    date: NaiveDate,
    field_id: &str,
) -> UploadOutcome {
    let key = object_key(field_id, date);
    let size = payload.len();
    let start = Instant::now();

    if let Err(e) = store.put_object(bucket, &key, payload).await {
        error!(
            error = %e,
            bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "An error occurred during image upload"
        );
        return UploadOutcome::Failed {
            key,
            error: e.to_string(),
        };
    }

    info!(
        bucket,
        key = %key,
        size_bytes = size,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Image uploaded"
    );

    let verified = verify_upload(store, bucket, &key).await;
    UploadOutcome::Stored { key, verified }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, 15).unwrap()
    }

    #[test]
    fn test_object_key() {
        assert_eq!(object_key("123", date()), "123/2023-06-15_imagery.png");
    }

    #[tokio::test]
    async fn test_upload_stores_and_verifies() {
        let store = MemoryStore::with_bucket("fields");
        let outcome =
            upload_image(&store, "fields", Bytes::from_static(b"Test content"), date(), "123").await;

        assert_eq!(
            outcome,
            UploadOutcome::Stored {
                key: "123/2023-06-15_imagery.png".to_string(),
                verified: true
            }
        );
        assert_eq!(
            store.object("fields", "123/2023-06-15_imagery.png").unwrap(),
            Bytes::from_static(b"Test content")
        );
    }

    #[tokio::test]
    async fn test_upload_without_bucket_fails() {
        let store = MemoryStore::new();
        let outcome =
            upload_image(&store, "fields", Bytes::from_static(b"Test content"), date(), "123").await;
        assert!(!outcome.is_stored());
        assert_eq!(store.put_attempts(), 1);
    }

    #[tokio::test]
    async fn test_upload_failure_skips_verification() {
        let store = MemoryStore::with_bucket("fields");
        store.fail_puts(true);
        let outcome = upload_image(&store, "fields", Bytes::from_static(b"x"), date(), "123").await;
        match outcome {
            UploadOutcome::Failed { key, error } => {
                assert_eq!(key, "123/2023-06-15_imagery.png");
                assert!(error.contains("put rejected"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stored_even_when_verification_fails() {
        let store = MemoryStore::with_bucket("fields");
        store.fail_heads(true);
        let outcome = upload_image(&store, "fields", Bytes::from_static(b"x"), date(), "123").await;
        assert_eq!(
            outcome,
            UploadOutcome::Stored {
                key: "123/2023-06-15_imagery.png".to_string(),
                verified: false
            }
        );
    }

    #[tokio::test]
    async fn test_reupload_overwrites() {
        let store = MemoryStore::with_bucket("fields");
        upload_image(&store, "fields", Bytes::from_static(b"first"), date(), "123").await;
        upload_image(&store, "fields", Bytes::from_static(b"second"), date(), "123").await;
        assert_eq!(store.keys("fields").len(), 1);
        assert_eq!(
            store.object("fields", "123/2023-06-15_imagery.png").unwrap(),
            Bytes::from_static(b"second")
        );
    }
}
