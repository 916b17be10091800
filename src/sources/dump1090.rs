//! Poller for the JSON feed served by dump1090.

use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::aggregator::{Aggregator, AggregatorError};
use crate::config::duration_str;
use crate::storage::{Position, Sample};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// URL of dump1090's `data.json`.
    pub address: String,
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,
    /// Aircraft not heard from for this long are skipped.
    #[serde(with = "duration_str")]
    pub max_age: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8080/data.json".to_string(),
            poll_interval: Duration::from_secs(1),
            max_age: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Dump1090Aircraft {
    hex: String,
    squawk: String,
    flight: String,
    lat: f64,
    lon: f64,
    validposition: i32,
    #[serde(deserialize_with = "lenient_int")]
    altitude: Option<i32>,
    #[serde(deserialize_with = "lenient_int")]
    speed: Option<i32>,
    track: i32,
    validtrack: i32,
    /// Seconds since the last message, fractional in newer dump1090 builds.
    seen: f64,
}

impl Dump1090Aircraft {
    fn into_sample(self) -> Sample {
        let flight_label = self.flight.trim();
        Sample {
            entity_id: Some(self.hex).filter(|hex| !hex.is_empty()),
            flight_label: (!flight_label.is_empty()).then(|| flight_label.to_string()),
            squawk_code: self.squawk.trim().parse().ok(),
            altitude: self.altitude,
            speed: self.speed,
            heading: (self.validtrack != 0).then_some(self.track),
            position: (self.validposition != 0).then(|| Position::new(self.lat, self.lon)),
        }
    }
}

/// dump1090 reports `"ground"` instead of an altitude for taxiing aircraft.
fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_i64().and_then(|v| i32::try_from(v).ok()))
}

fn parse_feed(body: &[u8], max_age: Duration) -> Result<Vec<Sample>, serde_json::Error> {
    let aircraft: Vec<Dump1090Aircraft> = serde_json::from_slice(body)?;
    Ok(aircraft
        .into_iter()
        .filter(|a| Duration::try_from_secs_f64(a.seen).is_ok_and(|seen| seen < max_age))
        .map(Dump1090Aircraft::into_sample)
        .collect())
}

async fn fetch(client: &reqwest::Client, config: &FeedConfig) -> Result<Vec<Sample>, String> {
    let response = client
        .get(&config.address)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?;
    let body = response.bytes().await.map_err(|e| e.to_string())?;
    parse_feed(&body, config.max_age).map_err(|e| e.to_string())
}

/// Polls the feed forever, handing every fresh aircraft to the aggregator.
pub fn spawn_dump1090(config: FeedConfig, aggregator: Aggregator) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to build HTTP client: {}", e);
                return;
            }
        };

        let mut ticker = interval(config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let samples = match fetch(&client, &config).await {
                Ok(samples) => samples,
                Err(e) => {
                    warn!("Error getting dump1090 data: {}", e);
                    continue;
                }
            };

            debug!("Received {} aircraft from dump1090", samples.len());
            for sample in samples {
                match aggregator.submit(sample) {
                    Ok(()) => {}
                    Err(AggregatorError::QueueFull) => {
                        warn!("Aggregator queue is full, dropping sample");
                    }
                    Err(AggregatorError::Closed) => {
                        warn!("Aggregator stopped, stopping dump1090 poller");
                        return;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"[
        {"hex":"4ca7b5","squawk":"7000","flight":"RYR12AB ","lat":52.1,"lon":20.9,
         "validposition":1,"altitude":34000,"vert_rate":0,"track":271,"validtrack":1,
         "speed":452,"messages":120,"seen":1},
        {"hex":"3c6444","squawk":"","flight":"","lat":0,"lon":0,
         "validposition":0,"altitude":"ground","track":0,"validtrack":0,
         "speed":12,"messages":3,"seen":2},
        {"hex":"","squawk":"1200","flight":"","lat":0,"lon":0,
         "validposition":0,"altitude":1000,"track":0,"validtrack":0,
         "speed":0,"messages":1,"seen":0},
        {"hex":"48ae21","squawk":"abc","flight":"LOT1","lat":1,"lon":1,
         "validposition":1,"altitude":1000,"track":5,"validtrack":1,
         "speed":100,"messages":50,"seen":30}
    ]"#;

    #[test]
    fn converts_valid_aircraft() {
        let samples = parse_feed(FEED.as_bytes(), Duration::from_secs(10)).unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(
            samples[0],
            Sample {
                entity_id: Some("4ca7b5".into()),
                flight_label: Some("RYR12AB".into()),
                squawk_code: Some(7000),
                altitude: Some(34000),
                speed: Some(452),
                heading: Some(271),
                position: Some(Position::new(52.1, 20.9)),
            }
        );
    }

    #[test]
    fn missing_values_stay_absent() {
        let samples = parse_feed(FEED.as_bytes(), Duration::from_secs(10)).unwrap();

        let ground = &samples[1];
        assert_eq!(ground.flight_label, None);
        assert_eq!(ground.squawk_code, None);
        assert_eq!(ground.altitude, None);
        assert_eq!(ground.heading, None);
        assert_eq!(ground.position, None);
        assert_eq!(ground.speed, Some(12));

        assert_eq!(samples[2].entity_id, None);
        assert_eq!(samples[2].squawk_code, Some(1200));
    }

    #[test]
    fn stale_aircraft_are_skipped() {
        let samples = parse_feed(FEED.as_bytes(), Duration::from_secs(60)).unwrap();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[3].squawk_code, None);
    }

    #[test]
    fn fractional_seen_is_accepted() {
        let feed = r#"[
            {"hex":"4ca7b5","squawk":"7000","flight":"RYR12AB","lat":52.1,"lon":20.9,
             "validposition":1,"altitude":34000,"track":271,"validtrack":1,
             "speed":452,"seen":0.4},
            {"hex":"48ae21","squawk":"","flight":"","lat":0,"lon":0,
             "validposition":0,"altitude":1000,"track":0,"validtrack":0,
             "speed":100,"seen":9.9},
            {"hex":"3c6444","squawk":"","flight":"","lat":0,"lon":0,
             "validposition":0,"altitude":1000,"track":0,"validtrack":0,
             "speed":100,"seen":10.2}
        ]"#;

        let samples = parse_feed(feed.as_bytes(), Duration::from_secs(10)).unwrap();

        let ids: Vec<_> = samples.iter().filter_map(|s| s.entity_id()).collect();
        assert_eq!(ids, vec!["4ca7b5", "48ae21"]);
    }

    #[test]
    fn malformed_feed_is_an_error() {
        assert!(parse_feed(b"{\"not\":\"a list\"}", Duration::from_secs(10)).is_err());
    }
}
