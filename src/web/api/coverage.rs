use axum::{
    extract::{Query, State},
    Json,
};

use crate::coverage::{polar, PolarPoint, StatsResponse};
use crate::web::api::error::{ApiResult, ErrorResponse};
use crate::web::api::planes::RangeQuery;
use crate::web::state::AppState;

#[utoipa::path(
    get,
    path = "/api/polar",
    params(RangeQuery),
    responses(
        (status = 200, description = "Farthest sample per degree of bearing from the station", body = Vec<PolarPoint>),
        (status = 400, description = "Invalid range", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "coverage"
)]
pub async fn polar_coverage(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<PolarPoint>>> {
    let (from, to) = query.bounds()?;
    let aggregator = state.aggregator.clone();
    let station = state.station;
    let points = tokio::task::spawn_blocking(move || {
        aggregator
            .by_range(from, to)
            .map(|samples| polar(&station, &samples))
    })
    .await??;
    Ok(Json(points))
}

#[utoipa::path(
    get,
    path = "/api/stats",
    responses(
        (status = 200, description = "Statistics of recent days, refreshed periodically", body = StatsResponse)
    ),
    tag = "coverage"
)]
pub async fn daily_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.stats.snapshot().await)
}
