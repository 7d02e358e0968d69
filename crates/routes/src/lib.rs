pub mod auth;
pub mod database;
pub mod errors;
pub mod geo;
pub mod gpx_parser;
pub mod handlers;
pub mod models;
pub mod request_id;
pub mod route_ingest;

use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use sqlx::PgPool;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    database::Database,
    handlers::{
        create_activity, create_route, delete_activity, delete_route, get_activity, get_route,
        health_check, list_routes, update_route, upload_gpx,
    },
    handlers::uploads::MAX_UPLOAD_BYTES,
    request_id::request_id_middleware,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::routes::create_route,
        handlers::routes::get_route,
        handlers::routes::list_routes,
        handlers::routes::update_route,
        handlers::routes::delete_route,
        handlers::uploads::upload_gpx,
        handlers::activities::create_activity,
        handlers::activities::get_activity,
        handlers::activities::delete_activity,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "routes", description = "Route creation and management"),
        (name = "uploads", description = "GPX file ingestion"),
        (name = "activities", description = "Exercise session records"),
    )
)]
struct ApiDoc;

pub fn create_router(pool: PgPool) -> Router {
    let db = Database::new(pool);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health_check))
        // Route management
        .route("/routes", get(list_routes).post(create_route))
        .route(
            "/routes/{id}",
            get(get_route).put(update_route).delete(delete_route),
        )
        // GPX ingestion
        .route("/gpx/upload", post(upload_gpx))
        // Activities
        .route("/activities", post(create_activity))
        .route(
            "/activities/{id}",
            get(get_activity).delete(delete_activity),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(Extension(db))
        // Multipart framing overhead on top of the file cap
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
}

pub async fn run_server(pool: PgPool, port: u16) -> anyhow::Result<()> {
    let app = create_router(pool);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    tracing::info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
