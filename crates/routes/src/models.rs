//! Domain models for routes and activities.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::geo::{BoundingBox, GeoPoint};

/// Route visibility. Private routes are readable only by their owner (or an
/// admin); public routes are globally readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    /// Lenient read from storage; unknown values fall back to private.
    pub fn from_db(value: &str) -> Self {
        match value {
            "public" => Visibility::Public,
            _ => Visibility::Private,
        }
    }
}

/// Kind of exercise session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Walk,
    Run,
    Bike,
    Hike,
    Swim,
    Ski,
    #[default]
    Other,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Walk => "walk",
            ActivityType::Run => "run",
            ActivityType::Bike => "bike",
            ActivityType::Hike => "hike",
            ActivityType::Swim => "swim",
            ActivityType::Ski => "ski",
            ActivityType::Other => "other",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "walk" => ActivityType::Walk,
            "run" => ActivityType::Run,
            "bike" => ActivityType::Bike,
            "hike" => ActivityType::Hike,
            "swim" => ActivityType::Swim,
            "ski" => ActivityType::Ski,
            _ => ActivityType::Other,
        }
    }
}

/// GeoJSON LineString geometry as exchanged with clients and PostGIS.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LineString {
    #[serde(rename = "type")]
    pub kind: String,
    /// Ordered [lon, lat] pairs.
    #[schema(value_type = Vec<Vec<f64>>)]
    pub coordinates: Vec<[f64; 2]>,
}

impl LineString {
    pub fn from_points(points: &[GeoPoint]) -> Self {
        Self {
            kind: "LineString".to_string(),
            coordinates: points.iter().map(|p| [p.lon, p.lat]).collect(),
        }
    }

    pub fn points(&self) -> Vec<GeoPoint> {
        self.coordinates
            .iter()
            .map(|c| GeoPoint::new(c[0], c[1]))
            .collect()
    }
}

/// A persisted polyline with derived geometry. The derived fields
/// (distance, bbox, center) are always written together with the geometry.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub geometry: LineString,
    pub distance_meters: f64,
    pub bbox: BoundingBox,
    pub center: GeoPoint,
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Route {
    /// Whether `user` may read this route.
    pub fn readable_by(&self, user_id: Uuid, is_admin: bool) -> bool {
        self.visibility == Visibility::Public || self.created_by == user_id || is_admin
    }

    /// Whether `user` may modify or delete this route.
    pub fn writable_by(&self, user_id: Uuid, is_admin: bool) -> bool {
        self.created_by == user_id || is_admin
    }
}

/// Free-form activity metrics. `gpx_checksum` carries the upload content
/// digest used for idempotency detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_pace: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_heart_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_heart_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_gain_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpx_checksum: Option<String>,
}

/// A completed exercise session, optionally tied to a route.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub route_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub duration_seconds: i64,
    pub distance_meters: Option<f64>,
    pub calories: Option<f64>,
    pub notes: Option<String>,
    pub metrics: Option<ActivityMetrics>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
