use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::aggregator::{AggregatorConfig, IngestConfig, PersistInterval};
use crate::coverage::StatsConfig;
use crate::sources::FeedConfig;
use crate::storage::cache::DEFAULT_CAPACITY;
use crate::storage::{Position, StoreOptions};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// Keys missing from the file keep their default values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log at debug level.
    pub debug: bool,
    pub web: WebConfig,
    pub feed: FeedConfig,
    pub storage: StorageConfig,
    pub aggregator: AggregatorSection,
    pub station: StationConfig,
    pub stats: StatsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8118".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub require_position: bool,
    /// Number of aircraft histories and of days kept in memory.
    pub cache_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/flightradar.db"),
            require_position: true,
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl StorageConfig {
    pub fn options(&self) -> StoreOptions {
        StoreOptions {
            require_position: self.require_position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorSection {
    pub queue_capacity: usize,
    #[serde(with = "duration_str")]
    pub data_timeout: Duration,
    #[serde(with = "duration_str")]
    pub persisted_marker_timeout: Duration,
    #[serde(with = "duration_str")]
    pub cleanup_interval: Duration,
    pub persist_interval: PersistIntervalSection,
}

impl Default for AggregatorSection {
    fn default() -> Self {
        let defaults = AggregatorConfig::default();
        Self {
            queue_capacity: defaults.queue_capacity,
            data_timeout: defaults.ingest.data_timeout,
            persisted_marker_timeout: defaults.ingest.persisted_marker_timeout,
            cleanup_interval: defaults.cleanup_interval,
            persist_interval: PersistIntervalSection::default(),
        }
    }
}

impl AggregatorSection {
    pub fn to_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            ingest: IngestConfig {
                persist_interval: self.persist_interval.to_interval(),
                data_timeout: self.data_timeout,
                persisted_marker_timeout: self.persisted_marker_timeout,
            },
            queue_capacity: self.queue_capacity,
            cleanup_interval: self.cleanup_interval,
        }
    }
}

/// Location of the receiver, in degrees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

impl StationConfig {
    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSection {
    /// Days, today included, daily statistics are kept for.
    pub days: u32,
    #[serde(with = "duration_str")]
    pub refresh_interval: Duration,
}

impl Default for StatsSection {
    fn default() -> Self {
        Self {
            days: 30,
            refresh_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl StatsSection {
    pub fn to_config(&self, station: Position) -> StatsConfig {
        StatsConfig {
            station,
            days: self.days,
            refresh_interval: self.refresh_interval,
        }
    }
}

/// Altitudes are in feet, as reported by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistIntervalSection {
    #[serde(with = "duration_str")]
    pub min: Duration,
    #[serde(with = "duration_str")]
    pub max: Duration,
    pub low_altitude: i32,
    pub high_altitude: i32,
}

impl Default for PersistIntervalSection {
    fn default() -> Self {
        let defaults = PersistInterval::default();
        Self {
            min: defaults.min,
            max: defaults.max,
            low_altitude: defaults.low_altitude,
            high_altitude: defaults.high_altitude,
        }
    }
}

impl PersistIntervalSection {
    fn to_interval(&self) -> PersistInterval {
        PersistInterval {
            min: self.min,
            max: self.max,
            low_altitude: self.low_altitude,
            high_altitude: self.high_altitude,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let aggregator = &self.aggregator;
        let interval = &aggregator.persist_interval;

        let nonzero_durations = [
            ("feed.poll_interval", self.feed.poll_interval),
            ("aggregator.cleanup_interval", aggregator.cleanup_interval),
            ("aggregator.persist_interval.min", interval.min),
            ("stats.refresh_interval", self.stats.refresh_interval),
        ];
        for (name, value) in nonzero_durations {
            if value.is_zero() {
                return Err(ConfigError::Invalid(name, "must be greater than zero".into()));
            }
        }

        if aggregator.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "aggregator.queue_capacity",
                "must be greater than zero".into(),
            ));
        }
        if self.storage.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "storage.cache_capacity",
                "must be greater than zero".into(),
            ));
        }
        if self.stats.days == 0 {
            return Err(ConfigError::Invalid(
                "stats.days",
                "must be greater than zero".into(),
            ));
        }
        if !(-90.0..=90.0).contains(&self.station.latitude) {
            return Err(ConfigError::Invalid(
                "station.latitude",
                format!("{} is not within -90..90", self.station.latitude),
            ));
        }
        if !(-180.0..=180.0).contains(&self.station.longitude) {
            return Err(ConfigError::Invalid(
                "station.longitude",
                format!("{} is not within -180..180", self.station.longitude),
            ));
        }
        if interval.min > interval.max {
            return Err(ConfigError::Invalid(
                "aggregator.persist_interval",
                format!(
                    "min ({}) exceeds max ({})",
                    humantime::format_duration(interval.min),
                    humantime::format_duration(interval.max)
                ),
            ));
        }
        if interval.low_altitude >= interval.high_altitude {
            return Err(ConfigError::Invalid(
                "aggregator.persist_interval",
                format!(
                    "low_altitude ({}) must be below high_altitude ({})",
                    interval.low_altitude, interval.high_altitude
                ),
            ));
        }
        Ok(())
    }
}

/// Durations written the humantime way, e.g. `15s` or `5m`.
pub mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.aggregator.to_config(), AggregatorConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_str(
            r#"
debug: true
feed:
  address: http://radar.local/data.json
aggregator:
  data_timeout: 30s
  persist_interval:
    max: 1m
"#,
        )
        .unwrap();

        assert!(config.debug);
        assert_eq!(config.feed.address, "http://radar.local/data.json");
        assert_eq!(config.feed.poll_interval, Duration::from_secs(1));
        assert_eq!(config.aggregator.data_timeout, Duration::from_secs(30));
        assert_eq!(
            config.aggregator.persisted_marker_timeout,
            Duration::from_secs(300)
        );

        let interval = config.aggregator.to_config().ingest.persist_interval;
        assert_eq!(interval.max, Duration::from_secs(60));
        assert_eq!(interval.min, Duration::from_secs(5));
    }

    #[test]
    fn default_config_round_trips_through_yaml() {
        let yaml = Config::default().to_yaml().unwrap();
        assert_eq!(Config::from_str(&yaml).unwrap(), Config::default());
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = Config::from_str(
            r#"
aggregator:
  persist_interval:
    min: 1m
    max: 10s
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("aggregator.persist_interval", _)));

        let err = Config::from_str(
            r#"
aggregator:
  persist_interval:
    low_altitude: 10000
    high_altitude: 10000
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("aggregator.persist_interval", _)));
    }

    #[test]
    fn rejects_zero_capacity_and_bad_durations() {
        assert!(matches!(
            Config::from_str("storage:\n  cache_capacity: 0\n"),
            Err(ConfigError::Invalid("storage.cache_capacity", _))
        ));
        assert!(matches!(
            Config::from_str("aggregator:\n  cleanup_interval: 0s\n"),
            Err(ConfigError::Invalid("aggregator.cleanup_interval", _))
        ));
        assert!(matches!(
            Config::from_str("aggregator:\n  data_timeout: soon\n"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            Config::from_str("stats:\n  days: 0\n"),
            Err(ConfigError::Invalid("stats.days", _))
        ));
    }

    #[test]
    fn station_section() {
        let config = Config::from_str(
            r#"
station:
  latitude: 50.06
  longitude: 19.94
stats:
  refresh_interval: 15m
"#,
        )
        .unwrap();

        let stats = config.stats.to_config(config.station.position());
        assert_eq!(stats.station, Position::new(50.06, 19.94));
        assert_eq!(stats.days, 30);
        assert_eq!(stats.refresh_interval, Duration::from_secs(15 * 60));

        assert!(matches!(
            Config::from_str("station:\n  latitude: 91\n"),
            Err(ConfigError::Invalid("station.latitude", _))
        ));
        assert!(matches!(
            Config::from_str("station:\n  longitude: -181.5\n"),
            Err(ConfigError::Invalid("station.longitude", _))
        ));
    }
}
