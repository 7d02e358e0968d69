//! Per-request correlation IDs.
//!
//! Every request runs inside a tracing span carrying a generated request id,
//! which is also echoed back in the `X-Request-ID` response header so API
//! clients can quote it in bug reports.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub async fn request_id_middleware(request: Request, next: Next) -> Response<Body> {
    let request_id = Uuid::new_v4();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
    );

    async move {
        let mut response = next.run(request).await;

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response
                .headers_mut()
                .insert(REQUEST_ID_HEADER.clone(), value);
        }

        tracing::info!(status = response.status().as_u16(), "Request handled");

        response
    }
    .instrument(span)
    .await
}
