use utoipa::OpenApi;

use super::api::error::ErrorResponse;
use super::api::planes::RangeQuery;
use crate::coverage::{DailyStats, PolarPoint, Stats, StatsResponse};
use crate::storage::{Position, Sample, StoredSample};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::planes::list_planes,
        super::api::planes::plane_history,
        super::api::planes::time_range,
        super::api::planes::export_samples,
        super::api::coverage::polar_coverage,
        super::api::coverage::daily_stats,
    ),
    components(
        schemas(
            Sample,
            Position,
            StoredSample,
            RangeQuery,
            PolarPoint,
            Stats,
            DailyStats,
            StatsResponse,
            ErrorResponse,
        )
    ),
    info(
        title = "Flightradar API",
        description = "Read-only access to live and recorded aircraft positions",
        version = "0.1.0"
    ),
    tags(
        (name = "planes", description = "Live and recorded aircraft data"),
        (name = "coverage", description = "Receiver range and daily statistics")
    )
)]
pub struct ApiDoc;
