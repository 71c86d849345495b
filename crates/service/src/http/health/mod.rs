use axum::routing::get;
use axum::Router;

pub mod readiness;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/readiness", get(readiness::handler))
        .with_state(state)
}
