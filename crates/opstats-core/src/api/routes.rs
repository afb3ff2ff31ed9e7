//! API routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))

        // Target-level lookups
        .route("/api/v1/operations/collected", post(handlers::has_collected_operations))
        .route("/api/v1/organizations/collected", post(handlers::organization_has_collected_operations))
        .route("/api/v1/operations/body", post(handlers::operation_body))

        // Statistical views
        .route("/api/v1/stats/operations", post(handlers::operations_stats))
        .route("/api/v1/stats/schema-coordinate", post(handlers::schema_coordinate_stats))
        .route("/api/v1/stats/field", post(handlers::field_stats))
        .route("/api/v1/stats/fields", post(handlers::field_list_stats))
        .route("/api/v1/stats/clients", post(handlers::client_stats))
        .route("/api/v1/stats/requests/project", post(handlers::project_requests_over_time))
        .route("/api/v1/stats/requests/targets", post(handlers::targets_requests_over_time))

        .with_state(state)
}
