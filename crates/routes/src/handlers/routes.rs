//! Route management handlers.

use axum::{
    Extension,
    extract::{Path, Query},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    database::{Database, NewRoute},
    errors::AppError,
    models::{LineString, Route, Visibility},
    route_ingest::{self, MAX_TAGS},
};

use super::pagination::{PaginatedResponse, PaginationQuery};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRouteRequest {
    #[validate(length(min = 3, max = 120, message = "name must be 3-120 characters"))]
    pub name: String,
    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    #[validate(length(max = 10, message = "at most 10 tags are allowed"))]
    pub tags: Vec<String>,
    pub geojson: LineString,
}

/// Distinguishes an absent JSON field (outer `None`) from an explicit
/// `null` (`Some(None)`), so updates can clear a value.
fn deserialize_clearable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRouteRequest {
    #[validate(length(min = 3, max = 120, message = "name must be 3-120 characters"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_clearable")]
    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub visibility: Option<Visibility>,
    #[validate(length(max = 10, message = "at most 10 tags are allowed"))]
    pub tags: Option<Vec<String>>,
    pub geojson: Option<LineString>,
}

/// Creation response: the contract fields only.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub id: Uuid,
    pub name: String,
    pub distance_meters: f64,
    pub visibility: Visibility,
}

impl From<&Route> for RouteSummary {
    fn from(route: &Route) -> Self {
        Self {
            id: route.id,
            name: route.name.clone(),
            distance_meters: route.distance_meters,
            visibility: route.visibility,
        }
    }
}

fn validation_details(errors: &validator::ValidationErrors) -> Vec<String> {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(_, errors)| {
            errors
                .iter()
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
        })
        .collect()
}

/// Validate a request geometry and derive route fields from it.
fn ingest_geometry(geojson: &LineString) -> Result<route_ingest::RouteGeometry, AppError> {
    if geojson.kind != "LineString" {
        return Err(AppError::Validation(vec![
            "geojson.type must be \"LineString\"".to_string(),
        ]));
    }
    let points = geojson.points();
    route_ingest::validate_polyline(&points)?;
    route_ingest::derive_route_geometry(points)
}

/// Create a route from a submitted polyline.
#[utoipa::path(
    post,
    path = "/routes",
    tag = "routes",
    request_body = CreateRouteRequest,
    responses(
        (status = 201, description = "Route created", body = RouteSummary),
        (status = 400, description = "Validation failure or degenerate geometry"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_route(
    Extension(db): Extension<Database>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreateRouteRequest>,
) -> Result<(StatusCode, Json<RouteSummary>), AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(validation_details(&e)))?;

    let geometry = ingest_geometry(&req.geojson)?;
    let tags = route_ingest::normalize_tags(req.tags);
    debug_assert!(tags.len() <= MAX_TAGS);

    let route = db
        .create_route(&NewRoute {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            geometry,
            tags,
            visibility: req.visibility.unwrap_or_default(),
            created_by: claims.sub,
        })
        .await?;

    tracing::info!(route_id = %route.id, user_id = %claims.sub, "Route created");

    Ok((StatusCode::CREATED, Json(RouteSummary::from(&route))))
}

/// Get a route by ID.
#[utoipa::path(
    get,
    path = "/routes/{id}",
    tag = "routes",
    params(("id" = Uuid, Path, description = "Route ID")),
    responses(
        (status = 200, description = "Route details", body = Route),
        (status = 403, description = "Private route owned by someone else"),
        (status = 404, description = "Route not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_route(
    Extension(db): Extension<Database>,
    AuthUser(claims): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Route>, AppError> {
    let route = db.get_route(id).await?.ok_or(AppError::NotFound)?;

    if !route.readable_by(claims.sub, claims.is_admin()) {
        return Err(AppError::ForbiddenRoute);
    }

    Ok(Json(route))
}

/// List routes visible to the caller (their own plus public ones).
#[utoipa::path(
    get,
    path = "/routes",
    tag = "routes",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Paginated routes", body = PaginatedResponse<Route>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_routes(
    Extension(db): Extension<Database>,
    AuthUser(claims): AuthUser,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<Route>>, AppError> {
    let (limit, offset) = pagination.clamped();
    let (routes, total) = db.list_routes(claims.sub, limit, offset).await?;
    Ok(Json(PaginatedResponse::new(routes, total, limit, offset)))
}

/// Update a route. A new polyline recomputes every derived field from
/// scratch; there is no incremental recomputation.
#[utoipa::path(
    put,
    path = "/routes/{id}",
    tag = "routes",
    params(("id" = Uuid, Path, description = "Route ID")),
    request_body = UpdateRouteRequest,
    responses(
        (status = 200, description = "Route updated", body = Route),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Route not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_route(
    Extension(db): Extension<Database>,
    AuthUser(claims): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRouteRequest>,
) -> Result<Json<Route>, AppError> {
    req.validate()
        .map_err(|e| AppError::Validation(validation_details(&e)))?;

    let existing = db.get_route(id).await?.ok_or(AppError::NotFound)?;
    if !existing.writable_by(claims.sub, claims.is_admin()) {
        return Err(AppError::Forbidden);
    }

    let geometry = match &req.geojson {
        Some(geojson) => ingest_geometry(geojson)?,
        // Unchanged geometry: reuse the stored derivation as-is
        None => route_ingest::RouteGeometry {
            points: existing.geometry.points(),
            distance_meters: existing.distance_meters,
            bbox: existing.bbox,
            center: existing.center,
        },
    };

    let name = req.name.unwrap_or(existing.name);
    // Absent field keeps the stored description; explicit null clears it
    let description = match req.description {
        Some(value) => value,
        None => existing.description,
    };
    let tags = match req.tags {
        Some(tags) => route_ingest::normalize_tags(tags),
        None => existing.tags,
    };
    let visibility = req.visibility.unwrap_or(existing.visibility);

    let route = db
        .update_route(id, &name, description.as_deref(), &geometry, &tags, visibility)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(route_id = %route.id, "Route updated");

    Ok(Json(route))
}

/// Soft delete a route.
#[utoipa::path(
    delete,
    path = "/routes/{id}",
    tag = "routes",
    params(("id" = Uuid, Path, description = "Route ID")),
    responses(
        (status = 200, description = "Route deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Route not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_route(
    Extension(db): Extension<Database>,
    AuthUser(claims): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let route = db.get_route(id).await?.ok_or(AppError::NotFound)?;
    if !route.writable_by(claims.sub, claims.is_admin()) {
        return Err(AppError::Forbidden);
    }

    if !db.soft_delete_route(id).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!(route_id = %id, "Route deleted");

    Ok(Json(serde_json::json!({ "id": id, "deleted": true })))
}
