use crate::error::LocationError;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct FieldLocation {
    pub field_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub dimension: f64,
}

impl FieldLocation {
    pub fn new(field_id: &str, latitude: f64, longitude: f64, dimension: f64) -> Self {
        Self {
            field_id: field_id.to_string(),
            latitude,
            longitude,
            dimension,
        }
    }
}

/// Reads `field_id, latitude, longitude, dimension` rows from a CSV file.
/// The first row is a header and is always discarded.
pub fn read_field_locations<P: AsRef<Path>>(path: P) -> Result<Vec<FieldLocation>, LocationError> {
    let content = fs::read_to_string(path)?;
    parse_field_locations(&content)
}

pub fn parse_field_locations(content: &str) -> Result<Vec<FieldLocation>, LocationError> {
    // Flexible so that a short or long row surfaces as a ColumnCount with its line
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let mut locations = vec![];
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map(|p| p.line() as usize).unwrap_or_default();
        locations.push(parse_record(line, &record)?);
    }
    Ok(locations)
}

fn parse_record(line: usize, record: &StringRecord) -> Result<FieldLocation, LocationError> {
    if record.len() != 4 {
        return Err(LocationError::ColumnCount {
            line,
            found: record.len(),
        });
    }

    Ok(FieldLocation {
        field_id: record[0].to_string(),
        latitude: parse_number(line, "latitude", &record[1])?,
        longitude: parse_number(line, "longitude", &record[2])?,
        dimension: parse_number(line, "dimension", &record[3])?,
    })
}

fn parse_number(line: usize, column: &'static str, value: &str) -> Result<f64, LocationError> {
    value.parse().map_err(|_| LocationError::InvalidNumber {
        line,
        column,
        value: value.to_string(),
    })
}
