//! Public temporary-link resolution. No owner header here: possession of
//! the slug is the whole credential.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use common::prelude::{LinkError, StoreError};

use crate::ServiceState;

/// Resolve a slug and serve the linked asset's original bytes. An expired
/// slug is deleted on contact and answered with 410.
pub async fn handler(
    State(state): State<ServiceState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, GwError> {
    let asset = state.links().resolve(&slug).await?;

    let data = state
        .store()
        .get_original(&asset)
        .await
        .map_err(LinkError::Store)?
        .ok_or_else(|| GwError::Link(LinkError::NotFound(slug)))?;

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
pub enum GwError {
    #[error("link error: {0}")]
    Link(#[from] LinkError),
}

impl IntoResponse for GwError {
    fn into_response(self) -> Response {
        match self {
            GwError::Link(LinkError::Expired(_)) => {
                (http::StatusCode::GONE, "link expired".to_string()).into_response()
            }
            GwError::Link(LinkError::NotFound(_))
            | GwError::Link(LinkError::Store(StoreError::AssetNotFound(_))) => {
                (http::StatusCode::NOT_FOUND, "not found".to_string()).into_response()
            }
            GwError::Link(_) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "unexpected error".to_string(),
            )
                .into_response(),
        }
    }
}
