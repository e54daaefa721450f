//! Run configuration, merged from an optional TOML file and CLI flags / environment variables
use crate::error::ConfigError;
use crate::fetch::DEFAULT_IMAGERY_API;
use crate::s3::DEFAULT_REGION;
use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DEFAULT_LOG_FILE: &str = "log.txt";

#[derive(Parser, Debug, Default)]
#[command(name = "field-imagery")]
#[command(version, about = "Fetch satellite imagery for field locations and store it in S3")]
pub struct Cli {
    /// TOML file with settings; flags and environment variables take precedence over it
    #[arg(short, long, env = "FIELD_IMAGERY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Imagery API endpoint
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "NASA_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Destination bucket, created if missing
    #[arg(short, long, env = "DESTINATION_BUCKET")]
    pub bucket: Option<String>,

    /// Processing date (YYYY-MM-DD)
    #[arg(short, long, env = "FIELD_DATE")]
    pub date: Option<String>,

    /// CSV file with a header row and `field_id,latitude,longitude,dimension` rows
    #[arg(short, long, env = "CSV_INPUT_FILE")]
    pub input: Option<PathBuf>,

    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible stores, e.g. http://localhost:9000
    #[arg(long, env = "S3_ENDPOINT_URL")]
    pub s3_endpoint: Option<String>,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: Option<String>,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: Option<String>,

    /// Per-request timeout for imagery calls, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Write a JSON batch summary to this path
    #[arg(long, env = "SUMMARY_FILE")]
    pub summary: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct FileSettings {
    base_url: Option<String>,
    api_key: Option<String>,
    bucket: Option<String>,
    date: Option<String>,
    input: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    log_file: Option<PathBuf>,
    summary_file: Option<PathBuf>,
    storage: FileStorageSettings,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct FileStorageSettings {
    region: Option<String>,
    endpoint_url: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
}

impl FileSettings {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }
}

#[derive(Clone)]
pub struct StorageConfig {
    pub region: String,
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub bucket: String,
    pub date: NaiveDate,
    pub input: PathBuf,
    pub storage: StorageConfig,
    pub request_timeout: Option<Duration>,
    pub log_file: PathBuf,
    pub summary_file: Option<PathBuf>,
}

impl MonitorConfig {
    pub fn resolve(cli: Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileSettings::read(path)?,
            None => FileSettings::default(),
        };
        Self::merge(cli, file)
    }

    pub fn merge(cli: Cli, file: FileSettings) -> Result<Self, ConfigError> {
        let base_url = cli
            .base_url
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_IMAGERY_API.to_string());
        let endpoint = Url::parse(&base_url).map_err(|e| ConfigError::Invalid {
            field: "base_url",
            reason: e.to_string(),
        })?;

        let date = cli.date.or(file.date).ok_or(ConfigError::Missing("date"))?;
        let date = parse_date(&date)?;

        let storage = StorageConfig {
            region: cli
                .region
                .or(file.storage.region)
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint_url: cli.s3_endpoint.or(file.storage.endpoint_url),
            access_key_id: cli
                .access_key_id
                .or(file.storage.access_key_id)
                .ok_or(ConfigError::Missing("access_key_id"))?,
            secret_access_key: cli
                .secret_access_key
                .or(file.storage.secret_access_key)
                .ok_or(ConfigError::Missing("secret_access_key"))?,
        };

        Ok(Self {
            endpoint,
            api_key: cli
                .api_key
                .or(file.api_key)
                .ok_or(ConfigError::Missing("api_key"))?,
            bucket: cli
                .bucket
                .or(file.bucket)
                .ok_or(ConfigError::Missing("bucket"))?,
            date,
            input: cli
                .input
                .or(file.input)
                .ok_or(ConfigError::Missing("input"))?,
            storage,
            request_timeout: cli
                .timeout_secs
                .or(file.request_timeout_secs)
                .map(Duration::from_secs),
            log_file: cli
                .log_file
                .or(file.log_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            summary_file: cli.summary.or(file.summary_file),
        })
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| ConfigError::Invalid {
        field: "date",
        reason: format!("'{value}': {e}"),
    })
}
