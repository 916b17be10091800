use std::path::Path;

use chrono::{DateTime, Utc};
use sled::transaction::{TransactionError, TransactionResult};
use sled::{Db, Transactional, Tree};

use super::codec::{decode, encode};
use super::error::StorageError;
use super::keys::{chronological_key, prefix_of, time_key};
use super::types::StoredSample;
use super::Storage;

/// Every sample ordered by time, across all entities.
const CHRONOLOGICAL_TREE: &str = "chronological";

/// Ids of entities which have their own partition.
const ENTITIES_TREE: &str = "entities";

const ENTITY_TREE_PREFIX: &str = "entity:";

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// Refuse samples without a position.
    pub require_position: bool,
}

/// Time-indexed store on top of sled. Cloning is cheap and every clone talks
/// to the same database.
#[derive(Clone)]
pub struct SledStorage {
    db: Db,
    chronological: Tree,
    entities: Tree,
    options: StoreOptions,
}

impl SledStorage {
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::with_db(db, options)
    }

    /// Opens a throwaway database which is removed when dropped.
    #[cfg(test)]
    pub fn temporary(options: StoreOptions) -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db, options)
    }

    fn with_db(db: Db, options: StoreOptions) -> Result<Self, StorageError> {
        // Top level partitions exist for the whole lifetime of the handle.
        let chronological = db.open_tree(CHRONOLOGICAL_TREE)?;
        let entities = db.open_tree(ENTITIES_TREE)?;
        Ok(Self {
            db,
            chronological,
            entities,
            options,
        })
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn entity_tree_name(entity_id: &str) -> String {
        format!("{}{}", ENTITY_TREE_PREFIX, entity_id)
    }

    fn validate<'a>(&self, data: &'a StoredSample) -> Result<&'a str, StorageError> {
        let entity_id = data
            .sample
            .entity_id()
            .ok_or(StorageError::MissingEntityId)?;
        if self.options.require_position && data.sample.position.is_none() {
            return Err(StorageError::MissingPosition(entity_id.to_string()));
        }
        Ok(entity_id)
    }

    fn decode_all(iter: sled::Iter) -> Result<Vec<StoredSample>, StorageError> {
        let mut rv = Vec::new();
        for item in iter {
            let (_, value) = item?;
            rv.push(decode(&value)?);
        }
        Ok(rv)
    }
}

impl Storage for SledStorage {
    fn store(&mut self, data: &StoredSample) -> Result<(), StorageError> {
        let entity_id = self.validate(data)?;
        let time_key = time_key(&data.timestamp)?;
        let chronological_key = chronological_key(&data.timestamp, entity_id)?;
        let value = encode(data);

        let entity = self.db.open_tree(Self::entity_tree_name(entity_id))?;

        let result: TransactionResult<()> = (&self.chronological, &self.entities, &entity)
            .transaction(|(chronological, entities, entity)| {
                chronological.insert(chronological_key.as_slice(), value.as_slice())?;
                entities.insert(entity_id.as_bytes(), &b""[..])?;
                entity.insert(time_key.as_slice(), value.as_slice())?;
                Ok(())
            });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Storage(e)) => Err(e.into()),
            Err(TransactionError::Abort(())) => Err(StorageError::Corrupt(
                "store transaction aborted".into(),
            )),
        }
    }

    fn retrieve_by_entity(&mut self, entity_id: &str) -> Result<Vec<StoredSample>, StorageError> {
        if !self.entities.contains_key(entity_id.as_bytes())? {
            return Ok(Vec::new());
        }
        let entity = self.db.open_tree(Self::entity_tree_name(entity_id))?;
        Self::decode_all(entity.iter())
    }

    fn retrieve_range(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StoredSample>, StorageError> {
        let min = time_key(&from)?;
        let max = time_key(&to)?;

        let mut rv = Vec::new();
        for item in self.chronological.range(min..) {
            let (key, value) = item?;
            // Only the timestamp part takes part in the comparison.
            if prefix_of(&key)? > max.as_slice() {
                break;
            }
            rv.push(decode(&value)?);
        }
        Ok(rv)
    }

    fn retrieve_all(&mut self) -> Result<Vec<StoredSample>, StorageError> {
        Self::decode_all(self.chronological.iter())
    }
}
