use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("entity id can't be empty")]
    MissingEntityId,
    #[error("sample for {0} has no position")]
    MissingPosition(String),
    #[error("timestamp {0} can't be encoded as a time key")]
    TimestampOutOfRange(String),
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StorageError {
    /// Validation failures are the caller's fault and never worth retrying.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StorageError::MissingEntityId
                | StorageError::MissingPosition(_)
                | StorageError::TimestampOutOfRange(_)
        )
    }
}
