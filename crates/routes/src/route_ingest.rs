//! Polyline validation and derived-geometry computation for routes.
//!
//! Candidate polylines arrive either from the direct route API or from GPX
//! upload. Validation runs before any geometry computation; the derived
//! fields (distance, bbox, center) are computed together so a route is never
//! persisted with partial geometry.

use crate::{
    errors::AppError,
    geo::{self, BoundingBox, GeoPoint},
};

pub const MIN_POINTS: usize = 2;
pub const MAX_POINTS: usize = 5000;
pub const MAX_TAGS: usize = 10;

/// Routes shorter than this are degenerate (GPS jitter, duplicated points)
/// and rejected outright.
pub const MIN_DISTANCE_METERS: f64 = 1.0;

/// Derived geometry for a validated polyline, ready to persist.
#[derive(Debug, Clone)]
pub struct RouteGeometry {
    pub points: Vec<GeoPoint>,
    /// Total path length, rounded to centimeter precision.
    pub distance_meters: f64,
    pub bbox: BoundingBox,
    pub center: GeoPoint,
}

impl RouteGeometry {
    /// WKT LINESTRING representation for PostGIS persistence.
    pub fn wkt(&self) -> String {
        let coords: Vec<String> = self
            .points
            .iter()
            .map(|p| format!("{} {}", p.lon, p.lat))
            .collect();
        format!("LINESTRING({})", coords.join(", "))
    }
}

/// Check point-count bounds and coordinate ranges. Runs before any geometry
/// computation; failures carry per-problem detail strings.
pub fn validate_polyline(points: &[GeoPoint]) -> Result<(), AppError> {
    let mut details = Vec::new();

    if points.len() < MIN_POINTS {
        details.push(format!("geometry must contain at least {MIN_POINTS} points"));
    }
    if points.len() > MAX_POINTS {
        details.push(format!("geometry must contain at most {MAX_POINTS} points"));
    }

    for (index, point) in points.iter().enumerate() {
        if !point.lon.is_finite() || point.lon < -180.0 || point.lon > 180.0 {
            details.push(format!("point {index}: longitude out of range [-180, 180]"));
        }
        if !point.lat.is_finite() || point.lat < -90.0 || point.lat > 90.0 {
            details.push(format!("point {index}: latitude out of range [-90, 90]"));
        }
        // One detail pair is enough to reject a garbage payload
        if details.len() >= 10 {
            break;
        }
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(details))
    }
}

/// Compute distance, bbox, and center for a validated polyline.
///
/// Fails with `ROUTE_TOO_SHORT` when the path length is below
/// [`MIN_DISTANCE_METERS`].
pub fn derive_route_geometry(points: Vec<GeoPoint>) -> Result<RouteGeometry, AppError> {
    let distance = geo::path_distance(&points);
    if distance < MIN_DISTANCE_METERS {
        return Err(AppError::RouteTooShort);
    }

    let bbox = geo::bounding_box(&points).ok_or(AppError::RouteTooShort)?;
    let center = bbox.center();

    // Centimeter precision is all the storage layer keeps
    let distance_meters = (distance * 100.0).round() / 100.0;

    Ok(RouteGeometry {
        points,
        distance_meters,
        bbox,
        center,
    })
}

/// Normalize user-supplied tags: trimmed, lowercased, de-duplicated,
/// empty entries dropped. Count limits are enforced by request validation.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}
