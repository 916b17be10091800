pub mod cache;
mod codec;
mod error;
mod keys;
mod sled_store;
#[cfg(test)]
pub mod testing;
mod types;

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

pub use cache::CachedStorage;
pub use error::StorageError;
pub use sled_store::{SledStorage, StoreOptions};
pub use types::{Position, Sample, StoredSample};

pub trait Storage {
    fn store(&mut self, data: &StoredSample) -> Result<(), StorageError>;

    /// History of one entity, oldest first.
    fn retrieve_by_entity(&mut self, entity_id: &str) -> Result<Vec<StoredSample>, StorageError>;

    /// Samples stamped within `[from, to)`, oldest first. [`SledStorage`]
    /// also returns samples stamped exactly at `to`; the cache relies on that
    /// to load whole day buckets and trims it away for its callers.
    fn retrieve_range(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StoredSample>, StorageError>;

    fn retrieve_all(&mut self) -> Result<Vec<StoredSample>, StorageError>;
}

/// Storage shared between the aggregator and readers. The cache is not safe
/// for concurrent use on its own, hence the lock.
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

pub fn shared<S: Storage + Send + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks shared storage. A panic while the lock was held can at worst leave
/// the cache missing an append, so poisoning is ignored.
pub fn lock(storage: &SharedStorage) -> MutexGuard<'_, dyn Storage + Send + 'static> {
    storage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
