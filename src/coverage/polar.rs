use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::storage::{Position, StoredSample};

use super::geo;

/// The farthest sample seen in one bearing bucket.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PolarPoint {
    /// Whole degrees clockwise from north, 0 to 359.
    pub bearing: u16,
    /// Kilometres from the station.
    pub distance: f64,
    pub data: StoredSample,
}

/// Buckets samples by whole degree of bearing from `station` and keeps the
/// farthest one of every bucket, ordered by bearing. Samples without a
/// position are skipped; on equal distance the earlier sample wins.
pub fn polar(station: &Position, samples: &[StoredSample]) -> Vec<PolarPoint> {
    let mut buckets: BTreeMap<u16, PolarPoint> = BTreeMap::new();
    for data in samples {
        let Some(position) = data.sample.position else {
            continue;
        };
        let bearing = (geo::bearing(station, &position).floor() as u16) % 360;
        let distance = geo::distance(station, &position);

        match buckets.get(&bearing) {
            Some(point) if point.distance >= distance => {}
            _ => {
                buckets.insert(
                    bearing,
                    PolarPoint {
                        bearing,
                        distance,
                        data: data.clone(),
                    },
                );
            }
        }
    }
    buckets.into_values().collect()
}
