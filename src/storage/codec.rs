//! Binary value encoding for stored samples.

use chrono::DateTime;
use prost::Message;

use super::error::StorageError;
use super::types::{Position, Sample, StoredSample};

#[derive(Clone, PartialEq, Message)]
struct SampleRecord {
    #[prost(string, optional, tag = "1")]
    entity_id: Option<String>,
    #[prost(string, optional, tag = "2")]
    flight_label: Option<String>,
    #[prost(double, optional, tag = "3")]
    latitude: Option<f64>,
    #[prost(double, optional, tag = "4")]
    longitude: Option<f64>,
    #[prost(int32, optional, tag = "5")]
    squawk_code: Option<i32>,
    #[prost(int32, optional, tag = "6")]
    altitude: Option<i32>,
    #[prost(int32, optional, tag = "7")]
    speed: Option<i32>,
    #[prost(int32, optional, tag = "8")]
    heading: Option<i32>,
    /// Seconds since the Unix epoch.
    #[prost(int64, tag = "9")]
    timestamp: i64,
    #[prost(uint32, tag = "10")]
    timestamp_nanos: u32,
}

pub fn encode(data: &StoredSample) -> Vec<u8> {
    let sample = &data.sample;
    SampleRecord {
        entity_id: sample.entity_id.clone(),
        flight_label: sample.flight_label.clone(),
        latitude: sample.position.map(|p| p.latitude),
        longitude: sample.position.map(|p| p.longitude),
        squawk_code: sample.squawk_code,
        altitude: sample.altitude,
        speed: sample.speed,
        heading: sample.heading,
        timestamp: data.timestamp.timestamp(),
        timestamp_nanos: data.timestamp.timestamp_subsec_nanos(),
    }
    .encode_to_vec()
}

pub fn decode(bytes: &[u8]) -> Result<StoredSample, StorageError> {
    let record = SampleRecord::decode(bytes)?;

    let position = match (record.latitude, record.longitude) {
        (Some(latitude), Some(longitude)) => Some(Position::new(latitude, longitude)),
        (None, None) => None,
        _ => {
            return Err(StorageError::Corrupt(
                "record holds only half of a position".into(),
            ))
        }
    };

    let timestamp = DateTime::from_timestamp(record.timestamp, record.timestamp_nanos)
        .ok_or_else(|| {
            StorageError::Corrupt(format!(
                "invalid timestamp {}.{:09}",
                record.timestamp, record.timestamp_nanos
            ))
        })?;

    Ok(StoredSample {
        sample: Sample {
            entity_id: record.entity_id,
            flight_label: record.flight_label,
            squawk_code: record.squawk_code,
            altitude: record.altitude,
            speed: record.speed,
            heading: record.heading,
            position,
        },
        timestamp,
    })
}
