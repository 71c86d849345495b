use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use common::prelude::{ReconcileError, StoreError};

use crate::http::api::v0::owner_from_headers;
use crate::ServiceState;

/// Serve an asset's original bytes. Gated on the owner's tier having
/// original access.
pub async fn handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, GetError> {
    let owner = owner_from_headers(&headers).ok_or(GetError::MissingOwner)?;

    let tier = state.reconciler().tier_for_owner(&owner).await?;
    if !tier.allow_original_access {
        return Err(GetError::Forbidden);
    }

    let asset = state
        .store()
        .database()
        .get_asset(&owner, &name)
        .await?
        .ok_or_else(|| GetError::NotFound(name.clone()))?;

    let data = state
        .store()
        .get_original(&asset)
        .await?
        .ok_or_else(|| GetError::NotFound(name.clone()))?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static(asset.original_format.content_type()),
    );
    if let Ok(value) = http::HeaderValue::from_str(&format!(
        "inline; filename=\"{}\"",
        asset.original_filename
    )) {
        response_headers.insert(http::header::CONTENT_DISPOSITION, value);
    }

    Ok((response_headers, data).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum GetError {
    #[error("missing owner header")]
    MissingOwner,
    #[error("tier does not allow original access")]
    Forbidden,
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),
}

impl IntoResponse for GetError {
    fn into_response(self) -> Response {
        match self {
            GetError::MissingOwner => {
                (http::StatusCode::BAD_REQUEST, "missing x-owner header").into_response()
            }
            GetError::Forbidden => (
                http::StatusCode::FORBIDDEN,
                "your tier does not include original downloads".to_string(),
            )
                .into_response(),
            GetError::NotFound(name) => (
                http::StatusCode::NOT_FOUND,
                format!("asset not found: {}", name),
            )
                .into_response(),
            GetError::Store(StoreError::AssetNotFound(name)) => (
                http::StatusCode::NOT_FOUND,
                format!("asset not found: {}", name),
            )
                .into_response(),
            GetError::Reconcile(ReconcileError::Store(StoreError::ProfileNotFound(_))) => {
                (http::StatusCode::NOT_FOUND, "unknown owner".to_string()).into_response()
            }
            GetError::Store(_) | GetError::Reconcile(_) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "unexpected error".to_string(),
            )
                .into_response(),
        }
    }
}
