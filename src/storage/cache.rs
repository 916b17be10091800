//! In-memory read-through cache in front of another [`Storage`].
//!
//! Two bounded maps are kept: whole histories of single entities and whole
//! day buckets of the chronological index. Writes are appended only to
//! entries which are already resident, so a bucket faulted in before a write
//! and evicted afterwards simply reloads from the inner store. Entries are
//! never refreshed otherwise, which means a resident entry may miss samples
//! written through another handle of the inner store.
//!
//! Range reads return samples within `[from, to)`. A range covering more
//! days than the cache holds is read straight from the inner store.
//!
//! Eviction sorts the entries by last access and drops everything past the
//! capacity. That is fine for a handful of entries; an ordered LRU list
//! would be the replacement if the capacity ever grows large.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Duration, Utc};
use log::debug;

use super::error::StorageError;
use super::types::StoredSample;
use super::Storage;

pub const DEFAULT_CAPACITY: usize = 10;

const DAY_SECONDS: i64 = 60 * 60 * 24;

struct CachedSamples {
    samples: Vec<StoredSample>,
    last_access: u64,
}

pub struct CachedStorage<S> {
    inner: S,
    capacity: usize,
    entities: HashMap<String, CachedSamples>,
    days: HashMap<i64, CachedSamples>,
    access_counter: u64,
}

impl<S: Storage> CachedStorage<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            entities: HashMap::new(),
            days: HashMap::new(),
            access_counter: 0,
        }
    }

    fn next_access(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    fn cleanup(&mut self) {
        for key in evict(&mut self.days, self.capacity) {
            debug!("Evicted day bucket {}", key);
        }
        for key in evict(&mut self.entities, self.capacity) {
            debug!("Evicted entity {}", key);
        }
    }

    #[cfg(test)]
    fn resident_entities(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entities.keys().cloned().collect();
        keys.sort();
        keys
    }

    #[cfg(test)]
    fn resident_days(&self) -> Vec<i64> {
        let mut keys: Vec<_> = self.days.keys().copied().collect();
        keys.sort();
        keys
    }
}

impl<S: Storage> Storage for CachedStorage<S> {
    fn store(&mut self, data: &StoredSample) -> Result<(), StorageError> {
        self.cleanup();

        self.inner.store(data)?;

        if let Some(entity_id) = data.sample.entity_id() {
            if let Some(cached) = self.entities.get_mut(entity_id) {
                insert_ordered(&mut cached.samples, data.clone());
                debug!("Appended to cached history of {}", entity_id);
            }
        }

        let day = day_of(&data.timestamp);
        if let Some(cached) = self.days.get_mut(&day) {
            insert_ordered(&mut cached.samples, data.clone());
            debug!("Appended to cached day bucket {}", day);
        }

        Ok(())
    }

    fn retrieve_by_entity(&mut self, entity_id: &str) -> Result<Vec<StoredSample>, StorageError> {
        self.cleanup();

        let access = self.next_access();
        if let Some(cached) = self.entities.get_mut(entity_id) {
            cached.last_access = access;
            return Ok(cached.samples.clone());
        }

        let samples = self.inner.retrieve_by_entity(entity_id)?;
        debug!(
            "Building cache for entity {} ({} elements)",
            entity_id,
            samples.len()
        );
        self.entities.insert(
            entity_id.to_string(),
            CachedSamples {
                samples: samples.clone(),
                last_access: access,
            },
        );

        self.cleanup();
        Ok(samples)
    }

    fn retrieve_range(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StoredSample>, StorageError> {
        self.cleanup();

        let mut rv = Vec::new();
        if from >= to {
            return Ok(rv);
        }

        let first = day_of(&from);
        let last = day_of(&to.checked_sub_signed(Duration::nanoseconds(1)).unwrap_or(to));
        let span = usize::try_from(last - first + 1).unwrap_or(usize::MAX);
        if span > self.capacity {
            debug!("Range spans {} days, reading past the cache", span);
            rv = self.inner.retrieve_range(from, to)?;
            rv.retain(|d| d.timestamp >= from && d.timestamp < to);
            return Ok(rv);
        }

        for day in first..=last {
            let access = self.next_access();
            if !self.days.contains_key(&day) {
                let (start, end) = day_span(day)?;
                let samples = self.inner.retrieve_range(start, end)?;
                debug!("Building cache for day {} ({} elements)", day, samples.len());
                self.days.insert(
                    day,
                    CachedSamples {
                        samples,
                        last_access: access,
                    },
                );
                // Days of this query are the most recent ones, so only older
                // buckets go.
                for key in evict(&mut self.days, self.capacity) {
                    debug!("Evicted day bucket {}", key);
                }
            }

            if let Some(cached) = self.days.get_mut(&day) {
                cached.last_access = access;
                rv.extend(
                    cached
                        .samples
                        .iter()
                        .filter(|d| d.timestamp >= from && d.timestamp < to)
                        .cloned(),
                );
            }
        }

        Ok(rv)
    }

    fn retrieve_all(&mut self) -> Result<Vec<StoredSample>, StorageError> {
        self.inner.retrieve_all()
    }
}

fn day_of(t: &DateTime<Utc>) -> i64 {
    t.timestamp().div_euclid(DAY_SECONDS)
}

/// Inclusive bounds of a day bucket, matching the inclusive range scan of the
/// inner store.
fn day_span(day: i64) -> Result<(DateTime<Utc>, DateTime<Utc>), StorageError> {
    let start = DateTime::from_timestamp(day * DAY_SECONDS, 0)
        .ok_or_else(|| StorageError::TimestampOutOfRange(format!("day {}", day)))?;
    let end = start + Duration::seconds(DAY_SECONDS) - Duration::nanoseconds(1);
    Ok((start, end))
}

/// Keeps `samples` ordered by time. A sample for the same entity and instant
/// replaces the previous one, as it does in the store.
fn insert_ordered(samples: &mut Vec<StoredSample>, data: StoredSample) {
    let index = samples.partition_point(|d| d.timestamp <= data.timestamp);
    let duplicate = samples[..index].iter().rposition(|d| {
        d.timestamp == data.timestamp && d.sample.entity_id == data.sample.entity_id
    });
    match duplicate {
        Some(i) => samples[i] = data,
        None => samples.insert(index, data),
    }
}

fn evict<K: Eq + Hash + Clone>(map: &mut HashMap<K, CachedSamples>, capacity: usize) -> Vec<K> {
    if map.len() <= capacity {
        return Vec::new();
    }

    let mut keys: Vec<(K, u64)> = map
        .iter()
        .map(|(key, value)| (key.clone(), value.last_access))
        .collect();
    keys.sort_unstable_by(|a, b| b.1.cmp(&a.1));

    keys.into_iter()
        .skip(capacity)
        .map(|(key, _)| {
            map.remove(&key);
            key
        })
        .collect()
}
