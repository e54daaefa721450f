//! In-memory [`ObjectStore`] standing in for S3 in tests

use crate::error::StorageError;
use crate::s3::{BucketStatus, ObjectHead, ObjectStore};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

type Buckets = HashMap<String, HashMap<String, Bytes>>;

/// Buckets and objects held behind a mutex. Puts and heads can be made to fail
/// so that error paths are reachable without a live service.
#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<Buckets>,
    writes: Mutex<Vec<String>>,
    put_attempts: AtomicUsize,
    fail_puts: AtomicBool,
    fail_heads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::new();
        if let Ok(mut buckets) = store.buckets.lock() {
            buckets.insert(bucket.to_string(), HashMap::new());
        }
        store
    }

    /// Every subsequent put fails with a backend error.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Every subsequent head fails with a backend error, as if the store became unreachable.
    pub fn fail_heads(&self, fail: bool) {
        self.fail_heads.store(fail, Ordering::SeqCst);
    }

    pub fn put_attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }

    /// Keys of successful puts, in the order they landed.
    pub fn writes(&self) -> Vec<String> {
        self.writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.lock()
            .map(|buckets| buckets.contains_key(bucket))
            .unwrap_or(false)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.lock().ok()?.get(bucket)?.get(key).cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys = self
            .lock()
            .ok()
            .and_then(|buckets| {
                buckets
                    .get(bucket)
                    .map(|objects| objects.keys().cloned().collect::<Vec<_>>())
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn lock(&self) -> Result<MutexGuard<'_, Buckets>, StorageError> {
        self.buckets
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))
    }
}

impl ObjectStore for MemoryStore {
    async fn create_bucket(self: &Self, bucket: &str) -> Result<BucketStatus, StorageError> {
        let mut buckets = self.lock()?;
        if buckets.contains_key(bucket) {
            return Ok(BucketStatus::AlreadyExists);
        }
        buckets.insert(bucket.to_string(), HashMap::new());
        Ok(BucketStatus::Created)
    }

    async fn put_object(
        self: &Self,
        bucket: &str,
        key: &str,
        body: Bytes,
    ) -> Result<(), StorageError> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("put rejected".to_string()));
        }
        let mut buckets = self.lock()?;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::NoSuchBucket(bucket.to_string()))?;
        // Last writer wins
        objects.insert(key.to_string(), body);
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(key.to_string());
        }
        Ok(())
    }

    async fn head_object(self: &Self, bucket: &str, key: &str) -> Result<ObjectHead, StorageError> {
        if self.fail_heads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("connection refused".to_string()));
        }
        let buckets = self.lock()?;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::NoSuchBucket(bucket.to_string()))?;
        let body = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ObjectHead {
            content_length: body.len() as u64,
        })
    }
}
