//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

pub use routes::{create_router, AppState};

use std::time::Duration;

use axum::http::header::{self, InvalidHeaderValue};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::store::Transactional;

const CORS_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

/// CORS policy admitting the frontend that hosts the verification page
pub fn cors_layer(frontend_base_url: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    let origin = HeaderValue::from_str(frontend_base_url.trim_end_matches('/'))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE))
}

/// Build the application router
pub fn build_router<B: Transactional>(state: AppState<B>, cors: CorsLayer) -> Router {
    let request_id = HeaderName::from_static(middleware::REQUEST_ID_HEADER);

    // Layers run outside-in: request id is set before logging sees the request
    let api_routes =
        create_router::<B>().layer(axum::middleware::from_fn(middleware::logging_middleware));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api_routes)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
