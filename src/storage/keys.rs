//! On-disk key layout.
//!
//! A time key is the UTC timestamp rendered with a fixed nine-digit fraction,
//! so that comparing two keys byte by byte gives the same answer as comparing
//! the instants. `chrono`'s default RFC 3339 output trims trailing zeros from
//! the fraction and would break range scans.

use chrono::{DateTime, Datelike, Utc};

use super::error::StorageError;

pub const TIME_KEY_LEN: usize = 30;

const TIME_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

pub fn time_key(t: &DateTime<Utc>) -> Result<Vec<u8>, StorageError> {
    if !(0..=9999).contains(&t.year()) {
        return Err(StorageError::TimestampOutOfRange(t.to_rfc3339()));
    }
    let key = t.format(TIME_KEY_FORMAT).to_string().into_bytes();
    debug_assert_eq!(key.len(), TIME_KEY_LEN);
    Ok(key)
}

pub fn chronological_key(t: &DateTime<Utc>, entity_id: &str) -> Result<Vec<u8>, StorageError> {
    let mut key = time_key(t)?;
    key.extend_from_slice(entity_id.as_bytes());
    Ok(key)
}

/// The timestamp part of a chronological key.
pub fn prefix_of(key: &[u8]) -> Result<&[u8], StorageError> {
    key.get(..TIME_KEY_LEN).ok_or_else(|| {
        StorageError::Corrupt(format!("key of {} bytes is shorter than a time key", key.len()))
    })
}
