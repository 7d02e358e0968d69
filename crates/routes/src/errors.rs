//! Application error taxonomy.
//!
//! Every failure maps to a stable machine-readable `code` (not just an HTTP
//! status) so API clients can branch programmatically. Internal detail is
//! logged, never leaked in the response body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::gpx_parser::GpxParseError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error(transparent)]
    GpxParse(#[from] GpxParseError),

    #[error("No file provided")]
    NoFile,

    #[error("File must have a .gpx extension")]
    InvalidExtension,

    #[error("File exceeds the maximum upload size")]
    FileTooLarge,

    #[error("Route is shorter than one meter")]
    RouteTooShort,

    #[error("End time must be after start time")]
    InvalidTimeRange,

    #[error("Route not found")]
    InvalidRoute,

    #[error("This GPX file has already been uploaded")]
    DuplicateGpx { activity_id: Uuid },

    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("You do not have access to this route")]
    ForbiddenRoute,

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    /// Stable machine-readable code surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Internal => "INTERNAL",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::GpxParse(e) => e.code(),
            AppError::NoFile => "NO_FILE",
            AppError::InvalidExtension => "INVALID_EXTENSION",
            AppError::FileTooLarge => "FILE_TOO_LARGE",
            AppError::RouteTooShort => "ROUTE_TOO_SHORT",
            AppError::InvalidTimeRange => "INVALID_TIME_RANGE",
            AppError::InvalidRoute => "INVALID_ROUTE",
            AppError::DuplicateGpx { .. } => "DUPLICATE_GPX",
            AppError::NotFound => "NOT_FOUND",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::ForbiddenRoute => "FORBIDDEN_ROUTE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_)
            | AppError::GpxParse(_)
            | AppError::NoFile
            | AppError::InvalidExtension
            | AppError::RouteTooShort
            | AppError::InvalidTimeRange
            | AppError::InvalidRoute => StatusCode::BAD_REQUEST,
            AppError::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::DuplicateGpx { .. } => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::ForbiddenRoute => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Database(e) => {
                error!("Database error: {e}");
                json!({ "error": "Internal server error", "code": self.code() })
            }
            AppError::Validation(details) => json!({
                "error": "Validation failed",
                "code": self.code(),
                "details": details,
            }),
            AppError::DuplicateGpx { activity_id } => json!({
                "error": self.to_string(),
                "code": self.code(),
                "activityId": activity_id,
            }),
            _ => json!({ "error": self.to_string(), "code": self.code() }),
        };

        (status, Json(body)).into_response()
    }
}
