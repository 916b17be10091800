mod aggregator;
mod error;
mod ingest;
mod interval;

pub use aggregator::{Aggregator, AggregatorConfig};
pub use error::AggregatorError;
pub use ingest::IngestConfig;
pub use interval::PersistInterval;
