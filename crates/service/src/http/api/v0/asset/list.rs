use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use common::prelude::StoreError;

use crate::http::api::v0::owner_from_headers;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSummary {
    pub name: String,
    pub filename: String,
    pub format: String,
    pub created_at: i64,
    pub heights: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub assets: Vec<AssetSummary>,
}

/// List the owner's assets with the derived heights currently on record.
pub async fn handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ListError> {
    let owner = owner_from_headers(&headers).ok_or(ListError::MissingOwner)?;

    let rows = state.store().database().list_assets(&owner).await?;

    let mut assets = Vec::with_capacity(rows.len());
    for row in rows {
        let heights = state.store().derived_heights(row.id).await?;
        assets.push(AssetSummary {
            name: row.name,
            filename: row.original_filename,
            format: row.original_format.as_str().to_string(),
            created_at: row.created_at,
            heights: heights.into_iter().collect(),
        });
    }

    Ok(axum::Json(ListResponse { assets }).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("missing owner header")]
    MissingOwner,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ListError {
    fn into_response(self) -> Response {
        match self {
            ListError::MissingOwner => {
                (http::StatusCode::BAD_REQUEST, "missing x-owner header").into_response()
            }
            ListError::Store(_) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "unexpected error".to_string(),
            )
                .into_response(),
        }
    }
}
