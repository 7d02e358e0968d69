//! sqlx persistence wrapper for routes and activities.
//!
//! Geometry is written as WKT through `ST_GeomFromText` and read back as
//! GeoJSON via `ST_AsGeoJSON`, keeping the stored form GIST-indexable. All
//! reads exclude soft-deleted rows.

use sqlx::{FromRow, PgPool, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    errors::AppError,
    geo::{BoundingBox, GeoPoint},
    models::{Activity, ActivityMetrics, ActivityType, LineString, Route, Visibility},
    route_ingest::RouteGeometry,
};

/// Everything needed to insert a route row; derived geometry comes from
/// [`RouteGeometry`] so it is always consistent with the polyline.
pub struct NewRoute {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub geometry: RouteGeometry,
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub created_by: Uuid,
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

const ROUTE_COLUMNS: &str = "id, name, description, ST_AsGeoJSON(geom) AS geometry_json, \
     distance_meters, min_lon, min_lat, max_lon, max_lat, center_lon, center_lat, \
     tags, visibility, created_by, created_at, updated_at";

const ACTIVITY_COLUMNS: &str = "id, user_id, route_id, activity_type, start_time, end_time, \
     duration_seconds, distance_meters, calories, notes, metrics, created_at";

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_route(&self, new_route: &NewRoute) -> Result<Route, AppError> {
        let row: RouteRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO routes (id, name, description, geom, distance_meters,
                                min_lon, min_lat, max_lon, max_lat, center_lon, center_lat,
                                tags, visibility, created_by)
            VALUES ($1, $2, $3, ST_GeomFromText($4, 4326), $5,
                    $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {ROUTE_COLUMNS}
            "#
        ))
        .bind(new_route.id)
        .bind(&new_route.name)
        .bind(&new_route.description)
        .bind(new_route.geometry.wkt())
        .bind(new_route.geometry.distance_meters)
        .bind(new_route.geometry.bbox.min_lon)
        .bind(new_route.geometry.bbox.min_lat)
        .bind(new_route.geometry.bbox.max_lon)
        .bind(new_route.geometry.bbox.max_lat)
        .bind(new_route.geometry.center.lon)
        .bind(new_route.geometry.center.lat)
        .bind(&new_route.tags)
        .bind(new_route.visibility.as_str())
        .bind(new_route.created_by)
        .fetch_one(&self.pool)
        .await?;

        row.into_route()
    }

    pub async fn get_route(&self, id: Uuid) -> Result<Option<Route>, AppError> {
        let row: Option<RouteRow> = sqlx::query_as(&format!(
            "SELECT {ROUTE_COLUMNS} FROM routes WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RouteRow::into_route).transpose()
    }

    /// Routes visible to `user_id`: their own plus public ones.
    pub async fn list_routes(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Route>, i64), AppError> {
        let rows: Vec<RouteRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ROUTE_COLUMNS} FROM routes
            WHERE deleted_at IS NULL AND (created_by = $1 OR visibility = 'public')
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM routes
            WHERE deleted_at IS NULL AND (created_by = $1 OR visibility = 'public')
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let routes = rows
            .into_iter()
            .map(RouteRow::into_route)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((routes, total))
    }

    /// Rewrite a route's mutable fields. Geometry and all derived fields are
    /// written in one statement so no partial-geometry state is observable.
    pub async fn update_route(
        &self,
        id: Uuid,
        name: &str,
        description: Option<&str>,
        geometry: &RouteGeometry,
        tags: &[String],
        visibility: Visibility,
    ) -> Result<Option<Route>, AppError> {
        let row: Option<RouteRow> = sqlx::query_as(&format!(
            r#"
            UPDATE routes
            SET name = $2, description = $3, geom = ST_GeomFromText($4, 4326),
                distance_meters = $5, min_lon = $6, min_lat = $7, max_lon = $8, max_lat = $9,
                center_lon = $10, center_lat = $11, tags = $12, visibility = $13,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {ROUTE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(geometry.wkt())
        .bind(geometry.distance_meters)
        .bind(geometry.bbox.min_lon)
        .bind(geometry.bbox.min_lat)
        .bind(geometry.bbox.max_lon)
        .bind(geometry.bbox.max_lat)
        .bind(geometry.center.lon)
        .bind(geometry.center.lat)
        .bind(tags)
        .bind(visibility.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(RouteRow::into_route).transpose()
    }

    pub async fn soft_delete_route(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE routes SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Live activity of this user carrying the given GPX content checksum.
    pub async fn find_activity_by_checksum(
        &self,
        user_id: Uuid,
        checksum: &str,
    ) -> Result<Option<Uuid>, AppError> {
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM activities
            WHERE user_id = $1 AND metrics ->> 'gpxChecksum' = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(checksum)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn create_activity(&self, activity: &Activity) -> Result<(), AppError> {
        insert_activity(activity).execute(&self.pool).await?;
        Ok(())
    }

    /// Persist an uploaded route and its derived activity atomically.
    ///
    /// A unique violation on the activity's checksum index means a concurrent
    /// upload of the same file won the race; the transaction rolls back and
    /// the winner's activity id is reported as `DUPLICATE_GPX`.
    pub async fn create_route_with_activity(
        &self,
        new_route: &NewRoute,
        activity: &Activity,
    ) -> Result<Route, AppError> {
        let mut tx = self.pool.begin().await?;

        let row: RouteRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO routes (id, name, description, geom, distance_meters,
                                min_lon, min_lat, max_lon, max_lat, center_lon, center_lat,
                                tags, visibility, created_by)
            VALUES ($1, $2, $3, ST_GeomFromText($4, 4326), $5,
                    $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {ROUTE_COLUMNS}
            "#
        ))
        .bind(new_route.id)
        .bind(&new_route.name)
        .bind(&new_route.description)
        .bind(new_route.geometry.wkt())
        .bind(new_route.geometry.distance_meters)
        .bind(new_route.geometry.bbox.min_lon)
        .bind(new_route.geometry.bbox.min_lat)
        .bind(new_route.geometry.bbox.max_lon)
        .bind(new_route.geometry.bbox.max_lat)
        .bind(new_route.geometry.center.lon)
        .bind(new_route.geometry.center.lat)
        .bind(&new_route.tags)
        .bind(new_route.visibility.as_str())
        .bind(new_route.created_by)
        .fetch_one(&mut *tx)
        .await?;

        let route = row.into_route()?;

        let inserted = insert_activity(activity).execute(&mut *tx).await;
        match inserted {
            Ok(_) => {
                tx.commit().await?;
                Ok(route)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                drop(tx);
                let checksum = activity
                    .metrics
                    .as_ref()
                    .and_then(|m| m.gpx_checksum.as_deref())
                    .unwrap_or_default();
                let existing = self
                    .find_activity_by_checksum(activity.user_id, checksum)
                    .await?
                    .ok_or(AppError::Internal)?;
                Err(AppError::DuplicateGpx {
                    activity_id: existing,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_activity(&self, id: Uuid) -> Result<Option<Activity>, AppError> {
        let row: Option<ActivityRow> = sqlx::query_as(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ActivityRow::into_activity))
    }

    pub async fn soft_delete_activity(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE activities SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn insert_activity(
    activity: &Activity,
) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO activities (id, user_id, route_id, activity_type, start_time, end_time,
                                duration_seconds, distance_meters, calories, notes, metrics)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(activity.id)
    .bind(activity.user_id)
    .bind(activity.route_id)
    .bind(activity.activity_type.as_str())
    .bind(activity.start_time)
    .bind(activity.end_time)
    .bind(activity.duration_seconds)
    .bind(activity.distance_meters)
    .bind(activity.calories)
    .bind(activity.notes.clone())
    .bind(activity.metrics.clone().map(Json))
}

#[derive(FromRow)]
struct RouteRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    geometry_json: String,
    distance_meters: f64,
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
    center_lon: f64,
    center_lat: f64,
    tags: Vec<String>,
    visibility: String,
    created_by: Uuid,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl RouteRow {
    fn into_route(self) -> Result<Route, AppError> {
        let geometry: LineString = serde_json::from_str(&self.geometry_json).map_err(|e| {
            tracing::error!("Stored route geometry is not valid GeoJSON: {e}");
            AppError::Internal
        })?;

        Ok(Route {
            id: self.id,
            name: self.name,
            description: self.description,
            geometry,
            distance_meters: self.distance_meters,
            bbox: BoundingBox {
                min_lon: self.min_lon,
                min_lat: self.min_lat,
                max_lon: self.max_lon,
                max_lat: self.max_lat,
            },
            center: GeoPoint::new(self.center_lon, self.center_lat),
            tags: self.tags,
            visibility: Visibility::from_db(&self.visibility),
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ActivityRow {
    id: Uuid,
    user_id: Uuid,
    route_id: Option<Uuid>,
    activity_type: String,
    start_time: OffsetDateTime,
    end_time: OffsetDateTime,
    duration_seconds: i64,
    distance_meters: Option<f64>,
    calories: Option<f64>,
    notes: Option<String>,
    metrics: Option<Json<ActivityMetrics>>,
    created_at: OffsetDateTime,
}

impl ActivityRow {
    fn into_activity(self) -> Activity {
        Activity {
            id: self.id,
            user_id: self.user_id,
            route_id: self.route_id,
            activity_type: ActivityType::from_db(&self.activity_type),
            start_time: self.start_time,
            end_time: self.end_time,
            duration_seconds: self.duration_seconds,
            distance_meters: self.distance_meters,
            calories: self.calories,
            notes: self.notes,
            metrics: self.metrics.map(|m| m.0),
            created_at: self.created_at,
        }
    }
}
