//! Pure geometry over ordered sequences of geographic points.
//!
//! All inputs are WGS84 lon/lat in degrees. Distances use the haversine
//! formula on a sphere of radius 6,371 km, which is plenty for local-scale
//! fitness tracks (no antipodal special-casing needed).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mean Earth radius in meters.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A (longitude, latitude) pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Axis-aligned bounding box of a path: (min_lon, min_lat, max_lon, max_lat).
/// Serialized with camelCase keys like the rest of the API surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Midpoint of the bbox diagonal. This is NOT a path centroid and is not
    /// guaranteed to lie on the path.
    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lon: (self.min_lon + self.max_lon) / 2.0,
            lat: (self.min_lat + self.max_lat) / 2.0,
        }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }
}

/// Great-circle distance in meters between two points.
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1_rad = a.lat.to_radians();
    let lat2_rad = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Total path length in meters: sum of consecutive pairwise distances.
///
/// Empty and single-point sequences have length 0.
pub fn path_distance(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(&pair[0], &pair[1]))
        .sum()
}

/// Bounding box over a non-empty point sequence. Returns `None` for empty
/// input; callers must reject that case upstream.
pub fn bounding_box(points: &[GeoPoint]) -> Option<BoundingBox> {
    let first = points.first()?;
    let mut bbox = BoundingBox {
        min_lon: first.lon,
        min_lat: first.lat,
        max_lon: first.lon,
        max_lat: first.lat,
    };

    for point in &points[1..] {
        bbox.min_lon = bbox.min_lon.min(point.lon);
        bbox.min_lat = bbox.min_lat.min(point.lat);
        bbox.max_lon = bbox.max_lon.max(point.lon);
        bbox.max_lat = bbox.max_lat.max(point.lat);
    }

    Some(bbox)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_path() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(-105.0000, 40.0000),
            GeoPoint::new(-105.0005, 40.0005),
            GeoPoint::new(-105.0010, 40.0003),
            GeoPoint::new(-105.0020, 40.0010),
        ]
    }

    #[test]
    fn distance_is_non_negative() {
        assert!(path_distance(&sample_path()) >= 0.0);
        assert_eq!(path_distance(&[]), 0.0);
        assert_eq!(path_distance(&[GeoPoint::new(10.0, 59.0)]), 0.0);
    }

    #[test]
    fn distance_of_identical_points_is_zero() {
        let points = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.0)];
        assert_eq!(path_distance(&points), 0.0);
    }

    #[test]
    fn distance_is_additive_under_splits() {
        let points = sample_path();
        let total = path_distance(&points);
        for k in 1..points.len() {
            // Split paths share the boundary point so segment sums match
            let head = path_distance(&points[..=k]);
            let tail = path_distance(&points[k..]);
            assert!((head + tail - total).abs() < 1e-9);
        }
    }

    #[test]
    fn distance_is_symmetric_under_reversal() {
        let points = sample_path();
        let mut reversed = points.clone();
        reversed.reverse();
        assert!((path_distance(&points) - path_distance(&reversed)).abs() < 1e-9);
    }

    #[test]
    fn known_separation_is_about_70_meters() {
        // 0.0005 deg in both axes at 40N: 55.6 m north, 42.6 m east
        let d = haversine_distance(
            &GeoPoint::new(-105.0000, 40.0000),
            &GeoPoint::new(-105.0005, 40.0005),
        );
        assert!((d - 70.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn bbox_contains_every_input_point() {
        let points = sample_path();
        let bbox = bounding_box(&points).unwrap();
        for point in &points {
            assert!(bbox.contains(point));
        }
    }

    #[test]
    fn bbox_of_empty_input_is_none() {
        assert!(bounding_box(&[]).is_none());
    }

    #[test]
    fn bbox_serializes_with_camel_case_keys() {
        let bbox = bounding_box(&sample_path()).unwrap();
        let json = serde_json::to_value(bbox).unwrap();
        assert!(json.get("minLon").is_some());
        assert!(json.get("maxLat").is_some());
        assert!(json.get("min_lon").is_none());
    }

    #[test]
    fn center_is_bbox_midpoint() {
        let bbox = bounding_box(&sample_path()).unwrap();
        let center = bbox.center();
        assert_eq!(center.lon, (bbox.min_lon + bbox.max_lon) / 2.0);
        assert_eq!(center.lat, (bbox.min_lat + bbox.max_lat) / 2.0);
    }

    #[test]
    fn two_point_path_is_valid() {
        let points = vec![GeoPoint::new(10.0, 59.0), GeoPoint::new(10.001, 59.001)];
        assert!(path_distance(&points) > 0.0);
        assert!(bounding_box(&points).is_some());
    }
}
