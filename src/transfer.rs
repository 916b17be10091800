//! Export to and import from JSON lines, one stored sample per line.
//!
//! Import also reads the older flat layout, `{"data":{"icao":..,"latitude":..},"time":..}`,
//! written by earlier versions of the collector.

use std::io::{BufRead, Write};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::storage::{Position, Sample, Storage, StorageError, StoredSample};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        source: serde_json::Error,
    },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub fn export(storage: &mut dyn Storage, writer: impl Write) -> Result<usize, TransferError> {
    let samples = storage.retrieve_all()?;
    write_lines(&samples, writer)?;
    Ok(samples.len())
}

pub fn write_lines(samples: &[StoredSample], mut writer: impl Write) -> Result<(), TransferError> {
    for data in samples {
        serde_json::to_writer(&mut writer, data)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn import(storage: &mut dyn Storage, reader: impl BufRead) -> Result<usize, TransferError> {
    let mut count = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let data = parse_line(&line).map_err(|source| TransferError::Line {
            line: index + 1,
            source,
        })?;
        storage.store(&data)?;
        count += 1;
    }
    Ok(count)
}

#[derive(Deserialize)]
struct FlatRecord {
    data: FlatSample,
    time: DateTime<Utc>,
}

#[derive(Deserialize)]
struct FlatSample {
    icao: Option<String>,
    flight_number: Option<String>,
    transponder_code: Option<i32>,
    altitude: Option<i32>,
    speed: Option<i32>,
    heading: Option<i32>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl From<FlatRecord> for StoredSample {
    fn from(record: FlatRecord) -> Self {
        let data = record.data;
        let position = match (data.latitude, data.longitude) {
            (Some(latitude), Some(longitude)) => Some(Position::new(latitude, longitude)),
            _ => None,
        };
        StoredSample::new(
            Sample {
                entity_id: data.icao,
                flight_label: data.flight_number,
                squawk_code: data.transponder_code,
                altitude: data.altitude,
                speed: data.speed,
                heading: data.heading,
                position,
            },
            record.time,
        )
    }
}

fn parse_line(line: &str) -> Result<StoredSample, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    if value.get("data").is_some() {
        serde_json::from_value::<FlatRecord>(value).map(StoredSample::from)
    } else {
        serde_json::from_value(value)
    }
}
