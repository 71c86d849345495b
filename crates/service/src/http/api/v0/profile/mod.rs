use axum::routing::post;
use axum::Router;

pub mod tier;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/tier", post(tier::handler))
        .with_state(state)
}
