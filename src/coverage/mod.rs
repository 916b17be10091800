//! Receiver coverage derived from recorded samples: the farthest sample per
//! bearing and per-day statistics.

mod geo;
mod polar;
mod stats;

pub use polar::{polar, PolarPoint};
pub use stats::{spawn_stats, DailyStats, Stats, StatsCache, StatsConfig, StatsResponse};
