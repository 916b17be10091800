use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::storage::{Sample, StoredSample};
use crate::transfer;
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::state::AppState;

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RangeQuery {
    /// Unix timestamp in seconds, inclusive.
    pub from: i64,
    /// Unix timestamp in seconds, exclusive.
    pub to: i64,
}

impl RangeQuery {
    pub fn bounds(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
        let from = DateTime::from_timestamp(self.from, 0)
            .ok_or_else(|| ApiError::Validation(format!("from out of range: {}", self.from)))?;
        let to = DateTime::from_timestamp(self.to, 0)
            .ok_or_else(|| ApiError::Validation(format!("to out of range: {}", self.to)))?;
        if from >= to {
            return Err(ApiError::Validation("from must be before to".into()));
        }
        Ok((from, to))
    }
}

#[utoipa::path(
    get,
    path = "/api/planes",
    responses(
        (status = 200, description = "Latest sample of every aircraft currently reporting", body = Vec<Sample>),
        (status = 503, description = "Aggregator not running", body = ErrorResponse)
    ),
    tag = "planes"
)]
pub async fn list_planes(State(state): State<AppState>) -> ApiResult<Json<Vec<Sample>>> {
    let latest = state.aggregator.latest().await?;
    let mut planes: Vec<(String, Sample)> = latest.into_iter().collect();
    planes.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(Json(planes.into_iter().map(|(_, sample)| sample).collect()))
}

#[utoipa::path(
    get,
    path = "/api/planes/{entity_id}",
    params(
        ("entity_id" = String, Path, description = "Transponder address in hex")
    ),
    responses(
        (status = 200, description = "Stored history of one aircraft, oldest first", body = Vec<StoredSample>),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "planes"
)]
pub async fn plane_history(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> ApiResult<Json<Vec<StoredSample>>> {
    let entity_id = entity_id
        .strip_suffix(".json")
        .map(String::from)
        .unwrap_or(entity_id);
    let aggregator = state.aggregator.clone();
    let history = tokio::task::spawn_blocking(move || aggregator.by_entity(&entity_id)).await??;
    Ok(Json(history))
}

#[utoipa::path(
    get,
    path = "/api/range",
    params(RangeQuery),
    responses(
        (status = 200, description = "Stored samples of all aircraft within the range", body = Vec<StoredSample>),
        (status = 400, description = "Invalid range", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "planes"
)]
pub async fn time_range(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<StoredSample>>> {
    let (from, to) = query.bounds()?;
    let aggregator = state.aggregator.clone();
    let samples = tokio::task::spawn_blocking(move || aggregator.by_range(from, to)).await??;
    Ok(Json(samples))
}

#[utoipa::path(
    get,
    path = "/api/export",
    responses(
        (status = 200, description = "Every stored sample as JSON lines, oldest first", body = String, content_type = "application/x-ndjson"),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "planes"
)]
pub async fn export_samples(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let aggregator = state.aggregator.clone();
    let body = tokio::task::spawn_blocking(move || -> ApiResult<Vec<u8>> {
        let samples = aggregator.all()?;
        let mut body = Vec::new();
        transfer::write_lines(&samples, &mut body)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(body)
    })
    .await??;
    Ok(([(header::CONTENT_TYPE, "application/x-ndjson")], body))
}
