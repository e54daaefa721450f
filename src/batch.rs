use crate::fetch::{FetchResult, ImageFetcher};
use crate::field_location::FieldLocation;
use crate::s3::ObjectStore;
use crate::upload::{upload_image, UploadOutcome};
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tokio::task::JoinSet;
use tracing::error;

/// Per-batch counters. `fetched + absent + task_failures == locations` once a batch returns.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub date: NaiveDate,
    pub locations: usize,
    pub fetched: usize,
    pub absent: usize,
    pub task_failures: usize,
    pub uploaded: usize,
    pub upload_failures: usize,
    pub verified: usize,
}

impl BatchSummary {
    pub fn new(date: NaiveDate, locations: usize) -> Self {
        Self {
            date,
            locations,
            fetched: 0,
            absent: 0,
            task_failures: 0,
            uploaded: 0,
            upload_failures: 0,
            verified: 0,
        }
    }

    pub fn resolved(self: &Self) -> usize {
        self.fetched + self.absent + self.task_failures
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let summary: Self = serde_json::from_str(&content)?;
        Ok(summary)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn record_upload(self: &mut Self, outcome: &UploadOutcome) {
        match outcome {
            UploadOutcome::Stored { verified, .. } => {
                self.uploaded += 1;
                if *verified {
                    self.verified += 1;
                }
            }
            UploadOutcome::Failed { .. } => self.upload_failures += 1,
        }
    }
}

/// Fetches imagery for every location concurrently and uploads each image as
/// soon as its fetch completes. Returns once every location is resolved.
pub async fn run_batch(
    fetcher: &ImageFetcher,
    store: &impl ObjectStore,
    bucket: &str,
    locations: &[FieldLocation],
    date: NaiveDate,
) -> BatchSummary {
    let mut tasks = JoinSet::new();
    for location in locations.iter().cloned() {
        let fetcher = fetcher.clone();
        tasks.spawn(async move {
            let result = fetcher.fetch(&location, date).await;
            (location.field_id, result)
        });
    }

    let mut summary = BatchSummary::new(date, locations.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((field_id, FetchResult::Success(payload))) => {
                summary.fetched += 1;
                let outcome = upload_image(store, bucket, payload, date, &field_id).await;
                summary.record_upload(&outcome);
            }
            Ok((_, FetchResult::Absent(_))) => summary.absent += 1,
            Err(e) => {
                error!(error = %e, date = %date, "Fetch task did not complete");
                summary.task_failures += 1;
            }
        }
    }
    summary
}
