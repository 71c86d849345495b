use axum::http::HeaderMap;
use axum::Router;

pub mod asset;
pub mod link;
pub mod profile;

use crate::ServiceState;

/// Header carrying the caller's resolved owner identity. Authentication
/// happens upstream of this service; the header value is trusted here.
pub const OWNER_HEADER: &str = "x-owner";

/// Pull the owner identity out of the request headers.
///
/// The owner id becomes a storage path segment, so anything containing a
/// separator is rejected here as if the header were absent.
pub fn owner_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && !s.contains(['/', '\\']) && *s != "." && *s != "..")
        .map(|s| s.to_string())
}

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .nest("/asset", asset::router(state.clone()))
        .nest("/link", link::router(state.clone()))
        .nest("/profile", profile::router(state.clone()))
        .with_state(state)
}
