use crate::aggregator::Aggregator;
use crate::coverage::StatsCache;
use crate::storage::Position;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
    /// Receiver location polar coverage is measured from.
    pub station: Position,
    pub stats: StatsCache,
}
