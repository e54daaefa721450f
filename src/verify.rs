use crate::error::StorageError;
use crate::s3::ObjectStore;
use tracing::{info, warn};

/// Confirms that `key` exists in `bucket` with a metadata-only request.
/// Never fails: anything other than a positive answer is `false`.
pub async fn verify_upload(store: &impl ObjectStore, bucket: &str, key: &str) -> bool {
    match store.head_object(bucket, key).await {
        Ok(head) => {
            info!(
                bucket,
                key,
                size_bytes = head.content_length,
                "File exists in bucket"
            );
            true
        }
        Err(StorageError::NotFound(_)) => {
            warn!(bucket, key, "File does not exist in bucket");
            false
        }
        Err(e) => {
            warn!(bucket, key, error = %e, "Unable to verify upload");
            false
        }
    }
}
