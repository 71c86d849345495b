use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use common::prelude::{LinkError, StoreError};

use crate::http::api::v0::owner_from_headers;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeResponse {
    pub slug: String,
}

/// Revoke one of the caller's links ahead of its expiry.
pub async fn handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, RevokeError> {
    let owner = owner_from_headers(&headers).ok_or(RevokeError::MissingOwner)?;

    // Only the owning namespace may revoke a slug
    let link = state
        .store()
        .database()
        .get_link(&slug)
        .await
        .map_err(LinkError::Store)?
        .ok_or_else(|| RevokeError::NotFound(slug.clone()))?;
    let asset = state
        .store()
        .database()
        .get_asset_by_id(link.asset_id)
        .await
        .map_err(LinkError::Store)?;
    match asset {
        Some(asset) if asset.owner == owner => {}
        _ => return Err(RevokeError::NotFound(slug)),
    }

    if !state.links().revoke(&slug).await? {
        return Err(RevokeError::NotFound(slug));
    }
    tracing::info!(owner = %owner, slug = %slug, "revoked link");

    Ok(axum::Json(RevokeResponse { slug }).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum RevokeError {
    #[error("missing owner header")]
    MissingOwner,
    #[error("link not found: {0}")]
    NotFound(String),
    #[error("link error: {0}")]
    Link(#[from] LinkError),
}

impl IntoResponse for RevokeError {
    fn into_response(self) -> Response {
        match self {
            RevokeError::MissingOwner => {
                (http::StatusCode::BAD_REQUEST, "missing x-owner header").into_response()
            }
            RevokeError::NotFound(slug) => (
                http::StatusCode::NOT_FOUND,
                format!("link not found: {}", slug),
            )
                .into_response(),
            RevokeError::Link(LinkError::Store(StoreError::AssetNotFound(name))) => (
                http::StatusCode::NOT_FOUND,
                format!("asset not found: {}", name),
            )
                .into_response(),
            RevokeError::Link(_) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "unexpected error".to_string(),
            )
                .into_response(),
        }
    }
}
