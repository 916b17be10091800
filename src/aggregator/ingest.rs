use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use tokio::time::Instant;

use crate::storage::{self, Position, Sample, SharedStorage, StoredSample};

use super::interval::PersistInterval;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestConfig {
    pub persist_interval: PersistInterval,
    /// How long the latest sample of an aircraft stays visible after it
    /// stops reporting.
    pub data_timeout: Duration,
    /// How long the last written sample is remembered for dedup.
    pub persisted_marker_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            persist_interval: PersistInterval::default(),
            data_timeout: Duration::from_secs(15),
            persisted_marker_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// What happened to a processed sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No entity id, nothing was recorded.
    Rejected,
    /// Kept as the latest sample but not written to storage.
    Recorded,
    Persisted,
    /// Storage refused the write. The sample is still the latest one.
    PersistFailed,
}

struct RecentEntry {
    sample: Sample,
    seen_at: Instant,
}

struct PersistedMarker {
    position: Position,
    persisted_at: Instant,
}

/// Per aircraft bookkeeping of the aggregator. Owned by exactly one task, so
/// nothing in here is synchronized.
pub struct Ingest {
    storage: SharedStorage,
    config: IngestConfig,
    recent: HashMap<String, RecentEntry>,
    persisted: HashMap<String, PersistedMarker>,
}

impl Ingest {
    pub fn new(storage: SharedStorage, config: IngestConfig) -> Self {
        Self {
            storage,
            config,
            recent: HashMap::new(),
            persisted: HashMap::new(),
        }
    }

    pub fn process(&mut self, sample: Sample, now: Instant) -> Outcome {
        let Some(entity_id) = sample.entity_id().map(String::from) else {
            return Outcome::Rejected;
        };

        let position = sample.position;
        let interval = self.config.persist_interval.for_altitude(sample.altitude);
        self.recent.insert(
            entity_id.clone(),
            RecentEntry {
                sample: sample.clone(),
                seen_at: now,
            },
        );

        let Some(position) = position else {
            return Outcome::Recorded;
        };

        if let Some(marker) = self.persisted.get(&entity_id) {
            let elapsed = now.saturating_duration_since(marker.persisted_at);
            if elapsed <= interval || !position.differs_from(&marker.position) {
                return Outcome::Recorded;
            }
        }

        let data = StoredSample::new(sample, Utc::now());
        if let Err(e) = storage::lock(&self.storage).store(&data) {
            if e.is_validation() {
                debug!("Sample of {} not stored: {}", entity_id, e);
            } else {
                warn!("Failed to store sample of {}: {}", entity_id, e);
            }
            return Outcome::PersistFailed;
        }

        debug!("Stored sample of {}", entity_id);
        self.persisted.insert(
            entity_id,
            PersistedMarker {
                position,
                persisted_at: now,
            },
        );
        Outcome::Persisted
    }

    /// Forgets aircraft which stopped reporting and stale dedup markers.
    pub fn sweep(&mut self, now: Instant) {
        let data_timeout = self.config.data_timeout;
        let marker_timeout = self.config.persisted_marker_timeout;

        let recent_before = self.recent.len();
        self.recent
            .retain(|_, entry| now.saturating_duration_since(entry.seen_at) <= data_timeout);

        let persisted_before = self.persisted.len();
        self.persisted.retain(|_, marker| {
            now.saturating_duration_since(marker.persisted_at) <= marker_timeout
        });

        debug!(
            "Sweep removed {} recent entries and {} persisted markers",
            recent_before - self.recent.len(),
            persisted_before - self.persisted.len()
        );
    }

    /// Latest sample of every aircraft seen within the data timeout.
    pub fn latest(&self, now: Instant) -> HashMap<String, Sample> {
        self.recent
            .iter()
            .filter(|(_, entry)| {
                now.saturating_duration_since(entry.seen_at) <= self.config.data_timeout
            })
            .map(|(id, entry)| (id.clone(), entry.sample.clone()))
            .collect()
    }

    #[cfg(test)]
    pub(super) fn tracked(&self) -> (usize, usize) {
        (self.recent.len(), self.persisted.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::MemoryStorage;

    fn ingest() -> (Ingest, MemoryStorage) {
        let memory = MemoryStorage::default();
        let ingest = Ingest::new(storage::shared(memory.clone()), IngestConfig::default());
        (ingest, memory)
    }

    fn sample(lat: f64, lon: f64, altitude: Option<i32>) -> Sample {
        Sample {
            entity_id: Some("aaaaaa".into()),
            altitude,
            position: Some(Position::new(lat, lon)),
            ..Default::default()
        }
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn rejects_sample_without_entity() {
        let (mut ingest, memory) = ingest();
        let now = Instant::now();

        let mut anonymous = sample(1.0, 1.0, None);
        anonymous.entity_id = None;
        assert_eq!(ingest.process(anonymous.clone(), now), Outcome::Rejected);

        anonymous.entity_id = Some(String::new());
        assert_eq!(ingest.process(anonymous, now), Outcome::Rejected);

        assert!(ingest.latest(now).is_empty());
        assert!(memory.stored().is_empty());
    }

    #[test]
    fn stores_once_when_sent_too_often() {
        let (mut ingest, memory) = ingest();
        let now = Instant::now();

        assert_eq!(ingest.process(sample(1.0, 1.0, None), now), Outcome::Persisted);
        assert_eq!(
            ingest.process(sample(2.0, 2.0, None), now + secs(1)),
            Outcome::Recorded
        );

        assert_eq!(memory.stored().len(), 1);
    }

    #[test]
    fn stores_once_when_identical() {
        let (mut ingest, memory) = ingest();
        let now = Instant::now();

        ingest.process(sample(1.0, 1.0, None), now);
        assert_eq!(
            ingest.process(sample(1.0, 1.0, None), now + secs(6)),
            Outcome::Recorded
        );

        assert_eq!(memory.stored().len(), 1);
    }

    #[test]
    fn stores_twice_when_different() {
        let (mut ingest, memory) = ingest();
        let now = Instant::now();

        ingest.process(sample(1.0, 1.0, None), now);
        assert_eq!(
            ingest.process(sample(2.0, 2.0, None), now + secs(6)),
            Outcome::Persisted
        );

        let stored = memory.stored();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].sample.position, Some(Position::new(2.0, 2.0)));
    }

    #[test]
    fn movement_along_one_axis_is_not_new_position() {
        let (mut ingest, memory) = ingest();
        let now = Instant::now();

        ingest.process(sample(1.0, 1.0, None), now);
        ingest.process(sample(1.0, 2.0, None), now + secs(6));

        assert_eq!(memory.stored().len(), 1);
    }

    #[test]
    fn cruising_aircraft_are_stored_less_often() {
        let (mut ingest, memory) = ingest();
        let now = Instant::now();

        ingest.process(sample(1.0, 1.0, Some(35_000)), now);
        assert_eq!(
            ingest.process(sample(2.0, 2.0, Some(35_000)), now + secs(20)),
            Outcome::Recorded
        );
        assert_eq!(
            ingest.process(sample(3.0, 3.0, Some(35_000)), now + secs(31)),
            Outcome::Persisted
        );

        assert_eq!(memory.stored().len(), 2);
    }

    #[test]
    fn sample_without_position_is_only_recorded() {
        let (mut ingest, memory) = ingest();
        let now = Instant::now();

        let mut data = sample(0.0, 0.0, Some(1_000));
        data.position = None;
        assert_eq!(ingest.process(data.clone(), now), Outcome::Recorded);

        assert_eq!(ingest.latest(now).get("aaaaaa"), Some(&data));
        assert!(memory.stored().is_empty());
    }

    #[test]
    fn failed_write_keeps_previous_marker() {
        let (mut ingest, memory) = ingest();
        let now = Instant::now();

        memory.fail_writes(true);
        assert_eq!(
            ingest.process(sample(1.0, 1.0, None), now),
            Outcome::PersistFailed
        );
        assert_eq!(ingest.tracked(), (1, 0));

        memory.fail_writes(false);
        assert_eq!(
            ingest.process(sample(1.0, 1.0, None), now + secs(1)),
            Outcome::Persisted
        );
    }

    #[test]
    fn out_of_order_instant_does_not_persist() {
        let (mut ingest, memory) = ingest();
        let now = Instant::now() + secs(100);

        ingest.process(sample(1.0, 1.0, None), now);
        assert_eq!(
            ingest.process(sample(2.0, 2.0, None), now - secs(50)),
            Outcome::Recorded
        );
        assert_eq!(memory.stored().len(), 1);
    }

    #[test]
    fn latest_hides_stale_entries() {
        let (mut ingest, _) = ingest();
        let now = Instant::now();

        let mut other = sample(5.0, 5.0, None);
        other.entity_id = Some("bbbbbb".into());

        ingest.process(sample(1.0, 1.0, None), now);
        ingest.process(other.clone(), now + secs(10));
        ingest.process(sample(2.0, 2.0, None), now + secs(1));

        let latest = ingest.latest(now + secs(20));
        assert_eq!(latest.len(), 1);
        assert_eq!(latest.get("bbbbbb"), Some(&other));

        let latest = ingest.latest(now + secs(5));
        assert_eq!(
            latest.get("aaaaaa").and_then(|s| s.position),
            Some(Position::new(2.0, 2.0))
        );
    }

    #[test]
    fn sweep_uses_separate_timeouts() {
        let (mut ingest, _) = ingest();
        let now = Instant::now();

        ingest.process(sample(1.0, 1.0, None), now);
        assert_eq!(ingest.tracked(), (1, 1));

        ingest.sweep(now + secs(10));
        assert_eq!(ingest.tracked(), (1, 1));

        ingest.sweep(now + secs(16));
        assert_eq!(ingest.tracked(), (0, 1));

        ingest.sweep(now + secs(301));
        assert_eq!(ingest.tracked(), (0, 0));
    }

    #[test]
    fn forgotten_marker_allows_same_position_again() {
        let (mut ingest, memory) = ingest();
        let now = Instant::now();

        ingest.process(sample(1.0, 1.0, None), now);
        ingest.sweep(now + secs(400));
        assert_eq!(
            ingest.process(sample(1.0, 1.0, None), now + secs(401)),
            Outcome::Persisted
        );
        assert_eq!(memory.stored().len(), 2);
    }
}
