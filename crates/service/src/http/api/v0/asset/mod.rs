use axum::routing::{get, post};
use axum::Router;

pub mod delete_asset;
pub mod get;
pub mod list;
pub mod thumbnail;
pub mod upload;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", get(list::handler))
        .route("/upload", post(upload::handler))
        .route("/:name", get(get::handler).delete(delete_asset::handler))
        .route("/:name/thumbnail/:height", get(thumbnail::handler))
        .with_state(state)
}
