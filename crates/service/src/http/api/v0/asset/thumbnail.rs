use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use common::prelude::StoreError;

use crate::http::api::v0::owner_from_headers;
use crate::ServiceState;

/// Serve a derived rendition at the requested height. Only heights the
/// reconciler has already produced are served; anything else is a 404.
pub async fn handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path((name, height)): Path<(String, u32)>,
) -> Result<impl IntoResponse, ThumbnailError> {
    let owner = owner_from_headers(&headers).ok_or(ThumbnailError::MissingOwner)?;

    let asset = state
        .store()
        .database()
        .get_asset(&owner, &name)
        .await?
        .ok_or_else(|| ThumbnailError::NotFound(name.clone()))?;

    let data = state
        .store()
        .get_derived(&asset, height)
        .await?
        .ok_or_else(|| ThumbnailError::NotFound(format!("{}/{}", name, height)))?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("image/jpeg"),
    );

    Ok((response_headers, data).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("missing owner header")]
    MissingOwner,
    #[error("thumbnail not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ThumbnailError {
    fn into_response(self) -> Response {
        match self {
            ThumbnailError::MissingOwner => {
                (http::StatusCode::BAD_REQUEST, "missing x-owner header").into_response()
            }
            ThumbnailError::NotFound(what) => (
                http::StatusCode::NOT_FOUND,
                format!("thumbnail not found: {}", what),
            )
                .into_response(),
            ThumbnailError::Store(_) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "unexpected error".to_string(),
            )
                .into_response(),
        }
    }
}
