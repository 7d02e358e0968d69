//! Activity handlers: session creation with derived duration and route
//! linkage, plus lookup and soft deletion.

use axum::{Extension, extract::Path, http::StatusCode, response::Json};
use serde::Deserialize;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    database::Database,
    errors::AppError,
    models::{Activity, ActivityMetrics, ActivityType},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub route_id: Option<Uuid>,
    #[validate(range(min = 0.0, message = "distanceMeters must be non-negative"))]
    pub distance_meters: Option<f64>,
    #[validate(range(min = 0.0, message = "calories must be non-negative"))]
    pub calories: Option<f64>,
    #[validate(length(max = 1000, message = "notes must be at most 1000 characters"))]
    pub notes: Option<String>,
    pub metrics: Option<ActivityMetrics>,
}

/// Duration in whole seconds between two instants, rounded.
fn derive_duration_seconds(start: OffsetDateTime, end: OffsetDateTime) -> i64 {
    ((end - start).whole_milliseconds() as f64 / 1000.0).round() as i64
}

/// Record a completed exercise session.
///
/// Duration is always derived from the time span. When a route is linked and
/// no explicit distance is given, the route's distance is inherited.
#[utoipa::path(
    post,
    path = "/activities",
    tag = "activities",
    request_body = CreateActivityRequest,
    responses(
        (status = 201, description = "Activity created", body = Activity),
        (status = 400, description = "Validation failure or invalid time range"),
        (status = 403, description = "Linked route not accessible")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_activity(
    Extension(db): Extension<Database>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<Activity>), AppError> {
    req.validate().map_err(|e| {
        let details: Vec<String> = e
            .field_errors()
            .into_iter()
            .flat_map(|(_, errors)| {
                errors
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
            })
            .collect();
        AppError::Validation(details)
    })?;

    if req.end_time <= req.start_time {
        return Err(AppError::InvalidTimeRange);
    }

    // A linked route must exist, be live, and be visible to the caller
    let route = match req.route_id {
        Some(route_id) => Some(
            db.get_route(route_id)
                .await?
                .ok_or(AppError::InvalidRoute)
                .and_then(|route| {
                    if route.readable_by(claims.sub, claims.is_admin()) {
                        Ok(route)
                    } else {
                        Err(AppError::ForbiddenRoute)
                    }
                })?,
        ),
        None => None,
    };

    let distance_meters = req
        .distance_meters
        .or_else(|| route.as_ref().map(|r| r.distance_meters));

    let activity = Activity {
        id: Uuid::new_v4(),
        user_id: claims.sub,
        route_id: req.route_id,
        activity_type: req.activity_type,
        start_time: req.start_time,
        end_time: req.end_time,
        duration_seconds: derive_duration_seconds(req.start_time, req.end_time),
        distance_meters,
        calories: req.calories,
        notes: req.notes,
        metrics: req.metrics,
        created_at: OffsetDateTime::now_utc(),
    };

    db.create_activity(&activity).await?;

    tracing::info!(activity_id = %activity.id, user_id = %claims.sub, "Activity created");

    Ok((StatusCode::CREATED, Json(activity)))
}

/// Get an activity by ID.
#[utoipa::path(
    get,
    path = "/activities/{id}",
    tag = "activities",
    params(("id" = Uuid, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Activity details", body = Activity),
        (status = 403, description = "Someone else's activity"),
        (status = 404, description = "Activity not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_activity(
    Extension(db): Extension<Database>,
    AuthUser(claims): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Activity>, AppError> {
    let activity = db.get_activity(id).await?.ok_or(AppError::NotFound)?;

    if activity.user_id != claims.sub && !claims.is_admin() {
        return Err(AppError::Forbidden);
    }

    Ok(Json(activity))
}

/// Soft delete an activity.
#[utoipa::path(
    delete,
    path = "/activities/{id}",
    tag = "activities",
    params(("id" = Uuid, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Activity deleted"),
        (status = 403, description = "Someone else's activity"),
        (status = 404, description = "Activity not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_activity(
    Extension(db): Extension<Database>,
    AuthUser(claims): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let activity = db.get_activity(id).await?.ok_or(AppError::NotFound)?;

    if activity.user_id != claims.sub && !claims.is_admin() {
        return Err(AppError::Forbidden);
    }

    if !db.soft_delete_activity(id).await? {
        return Err(AppError::NotFound);
    }

    tracing::info!(activity_id = %id, "Activity deleted");

    Ok(Json(serde_json::json!({ "id": id, "deleted": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn duration_is_whole_seconds_rounded() {
        let start = datetime!(2025-09-21 10:00:00 UTC);
        assert_eq!(
            derive_duration_seconds(start, datetime!(2025-09-21 10:05:00 UTC)),
            300
        );
        assert_eq!(
            derive_duration_seconds(start, start + time::Duration::milliseconds(1500)),
            2
        );
    }

    #[test]
    fn activity_type_uses_lowercase_wire_names() {
        let parsed: ActivityType = serde_json::from_str("\"bike\"").unwrap();
        assert_eq!(parsed, ActivityType::Bike);
        assert_eq!(serde_json::to_string(&ActivityType::Other).unwrap(), "\"other\"");
    }
}
