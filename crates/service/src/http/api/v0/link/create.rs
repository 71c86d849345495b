use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use common::prelude::{LinkError, StoreError};

use crate::http::api::v0::owner_from_headers;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Asset name within the caller's namespace
    pub asset: String,
    /// Lifetime of the link in seconds
    pub duration_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    pub slug: String,
    pub path: String,
    pub duration_secs: i64,
    pub created_at: i64,
}

/// Issue a temporary link for one of the caller's assets. The owner's
/// tier must carry the temporary-link capability.
pub async fn handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<CreateRequest>,
) -> Result<impl IntoResponse, CreateError> {
    let owner = owner_from_headers(&headers).ok_or(CreateError::MissingOwner)?;

    let asset = state
        .store()
        .database()
        .get_asset(&owner, &request.asset)
        .await
        .map_err(LinkError::Store)?
        .ok_or_else(|| CreateError::AssetNotFound(request.asset.clone()))?;

    let link = state.links().issue(&asset, request.duration_secs).await?;
    tracing::info!(owner = %owner, asset = %asset.name, slug = %link.slug, "issued link");

    Ok((
        http::StatusCode::CREATED,
        axum::Json(CreateResponse {
            path: format!("/gw/{}", link.slug),
            slug: link.slug,
            duration_secs: link.duration_secs,
            created_at: link.created_at,
        }),
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("missing owner header")]
    MissingOwner,
    #[error("asset not found: {0}")]
    AssetNotFound(String),
    #[error("link error: {0}")]
    Link(#[from] LinkError),
}

impl IntoResponse for CreateError {
    fn into_response(self) -> Response {
        match self {
            CreateError::MissingOwner => {
                (http::StatusCode::BAD_REQUEST, "missing x-owner header").into_response()
            }
            CreateError::AssetNotFound(name) => (
                http::StatusCode::NOT_FOUND,
                format!("asset not found: {}", name),
            )
                .into_response(),
            CreateError::Link(LinkError::Duration(secs)) => (
                http::StatusCode::BAD_REQUEST,
                format!("duration {}s is out of bounds", secs),
            )
                .into_response(),
            CreateError::Link(LinkError::Capability(_)) => (
                http::StatusCode::FORBIDDEN,
                "your tier does not include temporary links".to_string(),
            )
                .into_response(),
            CreateError::Link(LinkError::Store(StoreError::ProfileNotFound(_))) => {
                (http::StatusCode::NOT_FOUND, "unknown owner".to_string()).into_response()
            }
            CreateError::Link(_) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "unexpected error".to_string(),
            )
                .into_response(),
        }
    }
}
