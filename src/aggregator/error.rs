use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("ingestion queue is full")]
    QueueFull,
    #[error("aggregator is not running")]
    Closed,
}
