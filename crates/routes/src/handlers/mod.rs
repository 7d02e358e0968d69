//! HTTP request handlers, organized by domain.

// Utility submodules
pub mod pagination;

// Handler modules
pub mod activities;
pub mod routes;
pub mod uploads;

pub use activities::{CreateActivityRequest, create_activity, delete_activity, get_activity};
pub use routes::{
    CreateRouteRequest, RouteSummary, UpdateRouteRequest, create_route, delete_route, get_route,
    list_routes, update_route,
};
pub use uploads::{UploadResponse, upload_gpx};

use axum::response::Json;
use serde_json::{Value, json};

/// Liveness probe.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
