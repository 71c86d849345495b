use axum::routing::{delete, post};
use axum::Router;

pub mod create;
pub mod list;
pub mod revoke;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", post(create::handler).get(list::handler))
        .route("/:slug", delete(revoke::handler))
        .with_state(state)
}
