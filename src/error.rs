use thiserror::Error;

/// Failures reported by an [`ObjectStore`](crate::s3::ObjectStore) backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Bucket does not exist: {0}")]
    NoSuchBucket(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Unable to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Unable to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum LocationError {
    #[error("Unable to read locations file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Line {line}: expected 4 columns, found {found}")]
    ColumnCount { line: usize, found: usize },

    #[error("Line {line}: invalid {column} '{value}'")]
    InvalidNumber {
        line: usize,
        column: &'static str,
        value: String,
    },
}
