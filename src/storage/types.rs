use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Reported position. Latitude and longitude only ever travel together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both coordinates differ. A change along only one axis is
    /// treated as the same position for dedup purposes.
    pub fn differs_from(&self, other: &Position) -> bool {
        self.latitude != other.latitude && self.longitude != other.longitude
    }
}

/// One instantaneous report for one aircraft. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Sample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squawk_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Sample {
    /// The entity id, if present and non-empty.
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// A sample together with the moment it was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StoredSample {
    pub sample: Sample,
    pub timestamp: DateTime<Utc>,
}

impl StoredSample {
    pub fn new(sample: Sample, timestamp: DateTime<Utc>) -> Self {
        Self { sample, timestamp }
    }
}
