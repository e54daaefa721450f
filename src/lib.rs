#![allow(async_fn_in_trait)]
pub mod batch;
pub mod config;
pub mod error;
pub mod fetch;
pub mod field_location;
pub mod logging;
pub mod memory;
pub mod monitor;
pub mod s3;
pub mod upload;
pub mod verify;

pub use batch::{run_batch, BatchSummary};
pub use config::{Cli, MonitorConfig, StorageConfig};
pub use fetch::{AbsentReason, FetchRequest, FetchResult, ImageFetcher};
pub use field_location::{read_field_locations, FieldLocation};
pub use monitor::{BatchRun, BucketHandle, FieldMonitor};
pub use s3::{BucketStatus, ObjectStore, S3Store};
pub use upload::{object_key, upload_image, UploadOutcome};
pub use verify::verify_upload;
