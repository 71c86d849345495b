//! HTTP handlers and routers for the service.
//!
//! The routes here are the access-gateway boundary: they resolve the
//! caller's owner identity (from the `x-owner` header; authentication
//! mechanics live outside this service), enforce ownership and tier
//! capabilities, and forward validated requests to the reconciler, asset
//! store and link manager.

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use http::header::{ACCEPT, ORIGIN};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod gw;
pub mod handlers;
pub mod health;

use crate::ServiceState;

const API_PREFIX: &str = "/api";
const STATUS_PREFIX: &str = "/_status";

/// Maximum upload size in bytes (50 MB)
pub const MAX_UPLOAD_SIZE_BYTES: usize = 50 * 1024 * 1024;

/// Build the full router: authenticated API, public slug gateway and
/// health routes.
pub fn router(state: ServiceState) -> Router {
    let trace_layer = TraceLayer::new_for_http();

    // Public slug resolution is GET-only
    let gw_cors = CorsLayer::new()
        .allow_methods(vec![Method::GET])
        .allow_headers(vec![ACCEPT, ORIGIN])
        .allow_origin(Any)
        .allow_credentials(false);

    let gw_routes = Router::new()
        .route("/:slug", get(gw::handler))
        .with_state(state.clone())
        .layer(gw_cors);

    Router::new()
        .nest(API_PREFIX, api::router(state.clone()))
        .nest(STATUS_PREFIX, health::router(state.clone()))
        .nest("/gw", gw_routes)
        .fallback(handlers::not_found_handler)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE_BYTES))
        .with_state(state)
        .layer(trace_layer)
}
