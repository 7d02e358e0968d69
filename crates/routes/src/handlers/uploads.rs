//! GPX upload pipeline: file -> parse -> dedupe -> route + activity.

use axum::{Extension, extract::Multipart, http::StatusCode, response::Json};
use bytes::BytesMut;
use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    database::{Database, NewRoute},
    errors::AppError,
    geo::GeoPoint,
    gpx_parser::{self, TrackPoint},
    models::{Activity, ActivityMetrics, ActivityType, Visibility},
    route_ingest,
};

/// Upload size cap, enforced before any parsing work begins.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const GPX_SUFFIX: &str = ".gpx";

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub route_id: Uuid,
    pub activity_id: Uuid,
}

/// Upload a GPX file, creating a private route and a derived activity.
///
/// Re-uploading byte-identical content never creates a second route/activity
/// pair: the activity's stored content checksum is checked up front, and a
/// storage-level unique index catches the concurrent-upload race.
#[utoipa::path(
    post,
    path = "/gpx/upload",
    tag = "uploads",
    request_body(content_type = "multipart/form-data", description = "GPX file upload"),
    responses(
        (status = 201, description = "Route and activity created", body = UploadResponse),
        (status = 400, description = "Missing/invalid file or unparseable GPX"),
        (status = 409, description = "Identical file already uploaded"),
        (status = 413, description = "File exceeds the 5 MiB cap")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_gpx(
    Extension(db): Extension<Database>,
    AuthUser(claims): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let (filename, file_bytes) = {
        let mut file_bytes = BytesMut::new();
        let mut filename = None;

        while let Some(field) = multipart.next_field().await.map_err(|_| {
            AppError::Validation(vec!["Failed to process multipart data".to_string()])
        })? {
            if field.name() == Some("file") {
                filename = field.file_name().map(|s| s.to_string());
                let chunk = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::FileTooLarge)?;
                file_bytes.extend(chunk);
            } else {
                tracing::warn!("Unexpected field: {:?}", field.name());
            }
        }

        if file_bytes.is_empty() {
            return Err(AppError::NoFile);
        }
        (filename.ok_or(AppError::NoFile)?, file_bytes.freeze())
    };

    if !filename.to_lowercase().ends_with(GPX_SUFFIX) {
        return Err(AppError::InvalidExtension);
    }
    if file_bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::FileTooLarge);
    }

    let parsed = gpx_parser::parse_gpx(&file_bytes)?;

    // Fast-path dedupe; the unique index on (user, checksum) is the backstop
    if let Some(existing) = db
        .find_activity_by_checksum(claims.sub, &parsed.checksum)
        .await?
    {
        return Err(AppError::DuplicateGpx {
            activity_id: existing,
        });
    }

    // Elevation and time are irrelevant to route geometry
    let points: Vec<GeoPoint> = parsed
        .points
        .iter()
        .map(|p| GeoPoint::new(p.lon, p.lat))
        .collect();
    route_ingest::validate_polyline(&points)?;
    let geometry = route_ingest::derive_route_geometry(points)?;

    let (start_time, end_time, duration_seconds) = activity_window(&parsed.points);

    let route_id = Uuid::new_v4();
    let activity = Activity {
        id: Uuid::new_v4(),
        user_id: claims.sub,
        route_id: Some(route_id),
        // GPX does not encode the activity kind
        activity_type: ActivityType::Other,
        start_time,
        end_time,
        duration_seconds,
        distance_meters: Some(geometry.distance_meters),
        calories: None,
        notes: None,
        metrics: Some(ActivityMetrics {
            gpx_checksum: Some(parsed.checksum.clone()),
            ..Default::default()
        }),
        created_at: OffsetDateTime::now_utc(),
    };

    let new_route = NewRoute {
        id: route_id,
        name: route_name_from_filename(&filename),
        description: Some("Imported from GPX file".to_string()),
        geometry,
        tags: Vec::new(),
        visibility: Visibility::Private,
        created_by: claims.sub,
    };

    let route = db.create_route_with_activity(&new_route, &activity).await?;

    tracing::info!(
        route_id = %route.id,
        activity_id = %activity.id,
        user_id = %claims.sub,
        "GPX upload processed"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            route_id: route.id,
            activity_id: activity.id,
        }),
    ))
}

/// Route name from the uploaded filename with the `.gpx` suffix stripped.
/// Degenerate names fall back to a generic label. Length limits are in
/// characters, so multibyte filenames never split mid-character.
fn route_name_from_filename(filename: &str) -> String {
    let bytes = filename.as_bytes();
    let stem = if bytes.len() >= GPX_SUFFIX.len()
        && bytes[bytes.len() - GPX_SUFFIX.len()..].eq_ignore_ascii_case(GPX_SUFFIX.as_bytes())
    {
        // Suffix bytes are ASCII, so this split is on a char boundary
        &filename[..filename.len() - GPX_SUFFIX.len()]
    } else {
        filename
    };
    let stem = stem.trim();

    if stem.chars().count() < 3 {
        return "GPX import".to_string();
    }
    stem.chars().take(120).collect()
}

/// Start/end/duration for the derived activity. Files without timestamps get
/// a zero-length window at upload time; the duration floor keeps degenerate
/// timestamps from producing a zero or negative value.
fn activity_window(points: &[TrackPoint]) -> (OffsetDateTime, OffsetDateTime, i64) {
    let now = OffsetDateTime::now_utc();
    let start_time = points.first().and_then(|p| p.time).unwrap_or(now);
    let end_time = points.last().and_then(|p| p.time).unwrap_or(start_time);

    let span = end_time - start_time;
    let duration_seconds = ((span.whole_milliseconds() as f64 / 1000.0).round() as i64).max(1);

    (start_time, end_time, duration_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn point(time: Option<OffsetDateTime>) -> TrackPoint {
        TrackPoint {
            lon: -105.0,
            lat: 40.0,
            elevation: None,
            time,
        }
    }

    #[test]
    fn filename_stem_becomes_route_name() {
        assert_eq!(route_name_from_filename("morning-ride.gpx"), "morning-ride");
        assert_eq!(route_name_from_filename("Morning Ride.GPX"), "Morning Ride");
    }

    #[test]
    fn degenerate_filename_gets_fallback_name() {
        assert_eq!(route_name_from_filename(".gpx"), "GPX import");
        assert_eq!(route_name_from_filename("a.gpx"), "GPX import");
    }

    #[test]
    fn long_filename_is_truncated() {
        let filename = format!("{}.gpx", "x".repeat(300));
        assert_eq!(route_name_from_filename(&filename).len(), 120);
    }

    #[test]
    fn multibyte_filename_truncates_on_char_boundary() {
        // A two-byte char straddling the 120-byte mark must not split
        let filename = format!("{}é{}.gpx", "x".repeat(119), "y".repeat(10));
        let name = route_name_from_filename(&filename);
        assert_eq!(name.chars().count(), 120);
        assert!(name.ends_with('é'));
    }

    #[test]
    fn short_multibyte_stem_gets_fallback_name() {
        // Two chars, four bytes: still below the three-char minimum
        assert_eq!(route_name_from_filename("éà.gpx"), "GPX import");
        assert_eq!(route_name_from_filename("éà.GPX"), "GPX import");
    }

    #[test]
    fn window_spans_first_to_last_timestamp() {
        let points = vec![
            point(Some(datetime!(2025-09-21 10:00:00 UTC))),
            point(Some(datetime!(2025-09-21 10:02:30 UTC))),
            point(Some(datetime!(2025-09-21 10:05:00 UTC))),
        ];
        let (start, end, duration) = activity_window(&points);
        assert_eq!(start, datetime!(2025-09-21 10:00:00 UTC));
        assert_eq!(end, datetime!(2025-09-21 10:05:00 UTC));
        assert_eq!(duration, 300);
    }

    #[test]
    fn duration_is_floored_at_one_second() {
        let t = datetime!(2025-09-21 10:00:00 UTC);
        let points = vec![point(Some(t)), point(Some(t))];
        let (_, _, duration) = activity_window(&points);
        assert_eq!(duration, 1);
    }

    #[test]
    fn missing_timestamps_fall_back_to_upload_time() {
        let points = vec![point(None), point(None)];
        let (start, end, duration) = activity_window(&points);
        assert_eq!(start, end);
        assert_eq!(duration, 1);
    }
}
