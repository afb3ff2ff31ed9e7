//! API handlers for the HTTP REST API

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::models::{
    ClientStat, FieldListStatsSelector, FieldStats, FieldStatsSelector, MultiTargetSelector,
    OperationBodySelector, OperationsStats, OperationsStatsSelector, OrganizationSelector,
    ProjectPeriodSelector, SchemaCoordinateStats, SchemaCoordinateStatsSelector, SeriesPoint,
    TargetSelector,
};
use crate::pagination::CursorArgs;
use crate::stats::StatsManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// The resolution layer behind every stats endpoint
    pub manager: Arc<StatsManager>,
}

/// Map a domain error onto an HTTP status and message
fn into_http(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::InvalidRange(_) | Error::InvalidCursor(_) => StatusCode::BAD_REQUEST,
        Error::Upstream(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn default_resolution() -> u32 {
    30
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process serves traffic
    pub status: String,
    /// Build version
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Collected-operations check response
#[derive(Serialize)]
pub struct CollectedResponse {
    /// Whether the target has ever collected operations
    pub has_collected_operations: bool,
}

/// Check whether a target has ever collected operations
pub async fn has_collected_operations(
    State(state): State<AppState>,
    Json(selector): Json<TargetSelector>,
) -> Result<Json<CollectedResponse>, (StatusCode, String)> {
    let has_collected_operations = state
        .manager
        .has_collected_operations(&selector)
        .await
        .map_err(into_http)?;

    Ok(Json(CollectedResponse {
        has_collected_operations,
    }))
}

/// Check whether any target of an organization has collected operations
pub async fn organization_has_collected_operations(
    State(state): State<AppState>,
    Json(selector): Json<OrganizationSelector>,
) -> Result<Json<CollectedResponse>, (StatusCode, String)> {
    let has_collected_operations = state
        .manager
        .has_collected_operations_for_org(&selector)
        .await
        .map_err(into_http)?;

    Ok(Json(CollectedResponse {
        has_collected_operations,
    }))
}

/// Operation body lookup response
#[derive(Serialize)]
pub struct OperationBodyResponse {
    /// The stored document; `null` when the hash was never collected
    pub body: Option<String>,
}

/// Fetch the full operation document for a content hash
pub async fn operation_body(
    State(state): State<AppState>,
    Json(selector): Json<OperationBodySelector>,
) -> Result<Json<OperationBodyResponse>, (StatusCode, String)> {
    let body = state
        .manager
        .operation_body_by_hash(&selector)
        .await
        .map_err(into_http)?;

    Ok(Json(OperationBodyResponse { body }))
}

/// General operations-stats request
#[derive(Debug, Deserialize)]
pub struct OperationsStatsRequest {
    /// Target and period to aggregate over
    #[serde(flatten)]
    pub selector: OperationsStatsSelector,
    /// Number of time-series buckets over the period
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    /// Pagination of the per-operation list
    #[serde(flatten)]
    pub pagination: CursorArgs,
}

/// Full statistical view over one target and period
pub async fn operations_stats(
    State(state): State<AppState>,
    Json(req): Json<OperationsStatsRequest>,
) -> Result<Json<OperationsStats>, (StatusCode, String)> {
    let stats = state
        .manager
        .operations_stats(&req.selector, req.resolution, &req.pagination)
        .await
        .map_err(into_http)?;

    Ok(Json(stats))
}

/// Schema-coordinate-scoped stats request
#[derive(Debug, Deserialize)]
pub struct SchemaCoordinateStatsRequest {
    /// Target, period and coordinate to aggregate over
    #[serde(flatten)]
    pub selector: SchemaCoordinateStatsSelector,
    /// Number of time-series buckets over the period
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    /// Pagination of the per-operation list
    #[serde(flatten)]
    pub pagination: CursorArgs,
}

/// Statistical view scoped to one schema coordinate
pub async fn schema_coordinate_stats(
    State(state): State<AppState>,
    Json(req): Json<SchemaCoordinateStatsRequest>,
) -> Result<Json<SchemaCoordinateStats>, (StatusCode, String)> {
    let stats = state
        .manager
        .schema_coordinate_stats(&req.selector, req.resolution, &req.pagination)
        .await
        .map_err(into_http)?;

    Ok(Json(stats))
}

/// Usage stats for a single schema coordinate
pub async fn field_stats(
    State(state): State<AppState>,
    Json(selector): Json<FieldStatsSelector>,
) -> Result<Json<FieldStats>, (StatusCode, String)> {
    let stats = state
        .manager
        .field_stats(&selector)
        .await
        .map_err(into_http)?;

    Ok(Json(stats))
}

/// Field list stats response
#[derive(Serialize)]
pub struct FieldListStatsResponse {
    /// Per-coordinate usage stats, in selector order
    pub fields: Vec<FieldStats>,
}

/// Usage stats for a list of schema coordinates
pub async fn field_list_stats(
    State(state): State<AppState>,
    Json(selector): Json<FieldListStatsSelector>,
) -> Result<Json<FieldListStatsResponse>, (StatusCode, String)> {
    let fields = state
        .manager
        .field_list_stats(&selector)
        .await
        .map_err(into_http)?;

    Ok(Json(FieldListStatsResponse { fields }))
}

/// Project-wide requests-over-time request
#[derive(Debug, Deserialize)]
pub struct ProjectRequestsRequest {
    /// Project and period to aggregate over
    #[serde(flatten)]
    pub selector: ProjectPeriodSelector,
    /// Number of time-series buckets over the period
    #[serde(default = "default_resolution")]
    pub resolution: u32,
}

/// Scalar time-series response
#[derive(Serialize)]
pub struct SeriesResponse {
    /// Requests per time bucket
    pub requests_over_time: Vec<SeriesPoint>,
}

/// Requests per time bucket across all targets of a project
pub async fn project_requests_over_time(
    State(state): State<AppState>,
    Json(req): Json<ProjectRequestsRequest>,
) -> Result<Json<SeriesResponse>, (StatusCode, String)> {
    let requests_over_time = state
        .manager
        .project_requests_over_time(&req.selector, req.resolution)
        .await
        .map_err(into_http)?;

    Ok(Json(SeriesResponse { requests_over_time }))
}

/// Per-target requests-over-time request
#[derive(Debug, Deserialize)]
pub struct TargetsRequestsRequest {
    /// Targets and period to aggregate over
    #[serde(flatten)]
    pub selector: MultiTargetSelector,
    /// Number of time-series buckets over the period
    #[serde(default = "default_resolution")]
    pub resolution: u32,
}

/// Per-target time-series response
#[derive(Serialize)]
pub struct TargetSeriesResponse {
    /// Requests per time bucket, keyed by resolved target id
    pub requests_over_time: HashMap<String, Vec<SeriesPoint>>,
}

/// Requests per time bucket for each selected target
pub async fn targets_requests_over_time(
    State(state): State<AppState>,
    Json(req): Json<TargetsRequestsRequest>,
) -> Result<Json<TargetSeriesResponse>, (StatusCode, String)> {
    let requests_over_time = state
        .manager
        .requests_over_time_by_targets(&req.selector, req.resolution)
        .await
        .map_err(into_http)?;

    Ok(Json(TargetSeriesResponse { requests_over_time }))
}

/// Client stats response
#[derive(Serialize)]
pub struct ClientStatsResponse {
    /// Per-client stats across the selected targets
    pub clients: Vec<ClientStat>,
}

/// Per-client stats aggregated across several targets
pub async fn client_stats(
    State(state): State<AppState>,
    Json(selector): Json<MultiTargetSelector>,
) -> Result<Json<ClientStatsResponse>, (StatusCode, String)> {
    let clients = state
        .manager
        .client_stats_by_targets(&selector)
        .await
        .map_err(into_http)?;

    Ok(Json(ClientStatsResponse { clients }))
}
