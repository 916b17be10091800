use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, NaiveTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use utoipa::ToSchema;

use crate::aggregator::Aggregator;
use crate::storage::{Position, StoredSample};

use super::polar::polar;

/// Width of an altitude band in feet.
pub const ALTITUDE_STEP: i32 = 5000;

/// Farther than this a position is assumed to be garbage.
const DISTANCE_LIMIT_KM: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsConfig {
    pub station: Position,
    /// Number of days, today included, statistics are kept for.
    pub days: u32,
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct Stats {
    pub data_points: usize,
    /// Data points per altitude band of `altitude_step` feet. Band `-1`
    /// counts samples without altitude.
    pub altitude_cross_section: BTreeMap<i32, usize>,
    pub planes: usize,
    pub flights: usize,
    /// Kilometres, over the farthest sample of every bearing.
    pub average_distance: f64,
    pub median_distance: f64,
    pub max_distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub data: Stats,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Oldest day first.
    pub stats: Vec<DailyStats>,
    pub altitude_step: i32,
}

pub fn compute(station: &Position, samples: &[StoredSample]) -> Stats {
    let mut planes = HashSet::new();
    let mut flights = HashSet::new();
    let mut altitude_cross_section = BTreeMap::new();
    for data in samples {
        if let Some(entity_id) = data.sample.entity_id() {
            planes.insert(entity_id);
        }
        if let Some(flight) = data.sample.flight_label.as_deref() {
            flights.insert(flight);
        }
        let band = data.sample.altitude.map_or(-1, |a| a / ALTITUDE_STEP);
        *altitude_cross_section.entry(band).or_insert(0) += 1;
    }

    let mut distances: Vec<f64> = polar(station, samples)
        .into_iter()
        .map(|p| p.distance)
        .filter(|d| *d <= DISTANCE_LIMIT_KM)
        .collect();
    distances.sort_by(|a, b| a.total_cmp(b));

    let mut stats = Stats {
        data_points: samples.len(),
        altitude_cross_section,
        planes: planes.len(),
        flights: flights.len(),
        ..Default::default()
    };
    if let Some(max) = distances.last() {
        stats.max_distance = *max;
        stats.median_distance = distances[distances.len() / 2];
        stats.average_distance = distances.iter().sum::<f64>() / distances.len() as f64;
    }
    stats
}

/// Per-day statistics shared between the refresh task and the HTTP handlers.
#[derive(Clone, Default)]
pub struct StatsCache {
    days: Arc<RwLock<BTreeMap<NaiveDate, Stats>>>,
}

impl StatsCache {
    pub async fn snapshot(&self) -> StatsResponse {
        let days = self.days.read().await;
        StatsResponse {
            stats: days
                .iter()
                .map(|(date, data)| DailyStats {
                    date: *date,
                    data: data.clone(),
                })
                .collect(),
            altitude_step: ALTITUDE_STEP,
        }
    }

    /// Drops days which fell out of the window and computes the missing ones.
    /// Today and yesterday are recomputed every time since they may still
    /// receive samples.
    async fn refresh(&self, aggregator: &Aggregator, config: &StatsConfig, today: NaiveDate) {
        let oldest = today.checked_sub_days(Days::new(u64::from(config.days.saturating_sub(1))));
        self.days
            .write()
            .await
            .retain(|date, _| oldest.is_some_and(|oldest| *date >= oldest) && *date <= today);

        for offset in 0..config.days {
            let Some(date) = today.checked_sub_days(Days::new(u64::from(offset))) else {
                break;
            };
            if offset > 1 && self.days.read().await.contains_key(&date) {
                continue;
            }

            let from = date.and_time(NaiveTime::MIN).and_utc();
            let to = from + chrono::Duration::days(1);
            let reader = aggregator.clone();
            let station = config.station;
            let computed = tokio::task::spawn_blocking(move || {
                reader
                    .by_range(from, to)
                    .map(|samples| compute(&station, &samples))
            })
            .await;

            match computed {
                Ok(Ok(stats)) => {
                    debug!("Computed stats for {}: {} data points", date, stats.data_points);
                    self.days.write().await.insert(date, stats);
                }
                Ok(Err(e)) => warn!("Failed to compute stats for {}: {}", date, e),
                Err(e) => warn!("Stats task for {} failed: {}", date, e),
            }
        }
    }
}

/// Computes statistics right away and then every `refresh_interval`.
pub fn spawn_stats(aggregator: Aggregator, config: StatsConfig) -> (StatsCache, JoinHandle<()>) {
    let cache = StatsCache::default();
    let shared = cache.clone();
    let join = tokio::spawn(async move {
        let mut ticker = interval(config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Stats refresh started, keeping {} days", config.days);
        loop {
            ticker.tick().await;
            shared
                .refresh(&aggregator, &config, Utc::now().date_naive())
                .await;
        }
    });
    (cache, join)
}
