use crate::batch::{run_batch, BatchSummary};
use crate::config::MonitorConfig;
use crate::error::StorageError;
use crate::fetch::ImageFetcher;
use crate::field_location::FieldLocation;
use crate::s3::{BucketStatus, ObjectStore};
use chrono::NaiveDate;
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketHandle {
    pub name: String,
    pub status: BucketStatus,
}

#[derive(Debug, Clone)]
pub struct BatchRun {
    pub bucket: BucketHandle,
    pub summary: BatchSummary,
    pub elapsed: Duration,
}

/// Ties bucket setup, fan-out fetching and uploading together for one date.
pub struct FieldMonitor<S> {
    fetcher: ImageFetcher,
    store: S,
    bucket: String,
}

impl<S: ObjectStore> FieldMonitor<S> {
    pub fn new(fetcher: ImageFetcher, store: S, bucket: &str) -> Self {
        Self {
            fetcher,
            store,
            bucket: bucket.to_string(),
        }
    }

    pub fn from_config(config: &MonitorConfig, store: S) -> Result<Self, reqwest::Error> {
        let fetcher = match config.request_timeout {
            Some(timeout) => {
                ImageFetcher::with_timeout(config.endpoint.clone(), &config.api_key, timeout)?
            }
            None => ImageFetcher::new(config.endpoint.clone(), &config.api_key),
        };
        Ok(Self::new(fetcher, store, &config.bucket))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one batch. Errors that escape the per-location handling are logged
    /// and the run ends with `None`.
    pub async fn run(&self, date: NaiveDate, locations: &[FieldLocation]) -> Option<BatchRun> {
        match self.try_run(date, locations).await {
            Ok(run) => {
                let summary = &run.summary;
                info!(
                    bucket = %run.bucket.name,
                    date = %date,
                    locations = summary.locations,
                    fetched = summary.fetched,
                    absent = summary.absent,
                    uploaded = summary.uploaded,
                    upload_failures = summary.upload_failures,
                    verified = summary.verified,
                    elapsed_secs = run.elapsed.as_secs_f64(),
                    "Time performance {:.3} seconds",
                    run.elapsed.as_secs_f64()
                );
                Some(run)
            }
            Err(e) => {
                error!(bucket = %self.bucket, date = %date, error = %e, "During get_images");
                None
            }
        }
    }

    async fn try_run(
        &self,
        date: NaiveDate,
        locations: &[FieldLocation],
    ) -> Result<BatchRun, StorageError> {
        let start = Instant::now();

        let status = self.store.create_bucket(&self.bucket).await?;
        match status {
            BucketStatus::Created => info!(bucket = %self.bucket, "Created bucket"),
            BucketStatus::AlreadyExists => info!(bucket = %self.bucket, "Reusing existing bucket"),
        }

        let summary = run_batch(&self.fetcher, &self.store, &self.bucket, locations, date).await;

        Ok(BatchRun {
            bucket: BucketHandle {
                name: self.bucket.clone(),
                status,
            },
            summary,
            elapsed: start.elapsed(),
        })
    }
}
