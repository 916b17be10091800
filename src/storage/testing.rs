//! In-memory storage double for tests.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::{Storage, StorageError, StoredSample};

#[derive(Default)]
struct MemoryState {
    samples: Vec<StoredSample>,
    reads: usize,
    fail_writes: bool,
}

/// Clones share their contents, so a test can keep one handle while another
/// one is moved into the code under test.
#[derive(Default, Clone)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    pub fn stored(&self) -> Vec<StoredSample> {
        self.state.lock().unwrap().samples.clone()
    }

    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }
}

impl Storage for MemoryStorage {
    fn store(&mut self, data: &StoredSample) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(StorageError::Corrupt("write refused".into()));
        }
        state.samples.push(data.clone());
        Ok(())
    }

    fn retrieve_by_entity(&mut self, entity_id: &str) -> Result<Vec<StoredSample>, StorageError> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        let mut rv: Vec<_> = state
            .samples
            .iter()
            .filter(|d| d.sample.entity_id() == Some(entity_id))
            .cloned()
            .collect();
        rv.sort_by_key(|d| d.timestamp);
        Ok(rv)
    }

    fn retrieve_range(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StoredSample>, StorageError> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        let mut rv: Vec<_> = state
            .samples
            .iter()
            .filter(|d| d.timestamp >= from && d.timestamp <= to)
            .cloned()
            .collect();
        rv.sort_by_key(|d| d.timestamp);
        Ok(rv)
    }

    fn retrieve_all(&mut self) -> Result<Vec<StoredSample>, StorageError> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        Ok(state.samples.clone())
    }
}
