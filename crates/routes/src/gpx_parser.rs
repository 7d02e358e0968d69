//! GPX track-log parsing.
//!
//! Converts an uploaded GPX byte buffer into a flat, ordered list of track
//! points plus a SHA-256 checksum of the raw bytes (used for upload
//! deduplication, nothing more).
//!
//! Only the first segment of the first track is consulted. Multi-track and
//! multi-segment files are accepted, but everything past the first segment is
//! ignored; a warning is logged when that truncation drops data.

use gpx::{Gpx, TrackSegment};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;

/// A single timestamped point extracted from a GPX file. Transient: never
/// persisted as its own entity.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub lon: f64,
    pub lat: f64,
    pub elevation: Option<f64>,
    pub time: Option<OffsetDateTime>,
}

/// Parser output: ordered points plus the content checksum (SHA-256 hex).
#[derive(Debug)]
pub struct ParsedGpx {
    pub points: Vec<TrackPoint>,
    pub checksum: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GpxParseError {
    #[error("File is not well-formed GPX XML")]
    InvalidXml,

    #[error("GPX file contains no track")]
    NoTrack,

    #[error("First track contains no track points")]
    NoTrackpoints,

    #[error("Track has fewer than 2 usable points")]
    InsufficientPoints,
}

impl GpxParseError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            GpxParseError::InvalidXml => "INVALID_GPX_XML",
            GpxParseError::NoTrack => "NO_TRACK",
            GpxParseError::NoTrackpoints => "NO_TRACKPOINTS",
            GpxParseError::InsufficientPoints => "INSUFFICIENT_POINTS",
        }
    }
}

/// Parse a raw GPX buffer into track points and a content checksum.
pub fn parse_gpx(content: &[u8]) -> Result<ParsedGpx, GpxParseError> {
    let checksum = hex::encode(Sha256::digest(content));

    let gpx: Gpx = gpx::read(content).map_err(|e| {
        tracing::debug!("GPX parse failure: {e}");
        GpxParseError::InvalidXml
    })?;

    let track = gpx.tracks.first().ok_or(GpxParseError::NoTrack)?;
    let segment = track
        .segments
        .first()
        .ok_or(GpxParseError::NoTrackpoints)?;
    if segment.points.is_empty() {
        return Err(GpxParseError::NoTrackpoints);
    }

    let extra_segments = track.segments.len().saturating_sub(1);
    let extra_tracks = gpx.tracks.len().saturating_sub(1);
    if extra_segments > 0 || extra_tracks > 0 {
        tracing::warn!(
            extra_tracks,
            extra_segments,
            "GPX file has multiple tracks/segments; only the first segment of the first track is used"
        );
    }

    let points = extract_points(segment);
    if points.len() < 2 {
        return Err(GpxParseError::InsufficientPoints);
    }

    Ok(ParsedGpx { points, checksum })
}

/// Extract usable points from a segment, dropping any with non-finite
/// coordinates rather than failing the whole file.
fn extract_points(segment: &TrackSegment) -> Vec<TrackPoint> {
    segment
        .points
        .iter()
        .filter_map(|waypoint| {
            let point = waypoint.point();
            let (lon, lat) = (point.x(), point.y());
            if !lon.is_finite() || !lat.is_finite() {
                return None;
            }
            Some(TrackPoint {
                lon,
                lat,
                elevation: waypoint.elevation,
                time: waypoint.time.map(Into::into),
            })
        })
        .collect()
}
