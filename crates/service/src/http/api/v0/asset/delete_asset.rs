use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use common::prelude::StoreError;

use crate::http::api::v0::owner_from_headers;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub name: String,
}

/// Remove an asset, its derived renditions, and any links pointing at it.
pub async fn handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, DeleteError> {
    let owner = owner_from_headers(&headers).ok_or(DeleteError::MissingOwner)?;

    let asset = state
        .store()
        .database()
        .get_asset(&owner, &name)
        .await?
        .ok_or_else(|| DeleteError::NotFound(name.clone()))?;

    if !state.store().delete_asset(&asset).await? {
        return Err(DeleteError::NotFound(name));
    }

    Ok(axum::Json(DeleteResponse { name }).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error("missing owner header")]
    MissingOwner,
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for DeleteError {
    fn into_response(self) -> Response {
        match self {
            DeleteError::MissingOwner => {
                (http::StatusCode::BAD_REQUEST, "missing x-owner header").into_response()
            }
            DeleteError::NotFound(name) => (
                http::StatusCode::NOT_FOUND,
                format!("asset not found: {}", name),
            )
                .into_response(),
            DeleteError::Store(_) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "unexpected error".to_string(),
            )
                .into_response(),
        }
    }
}
