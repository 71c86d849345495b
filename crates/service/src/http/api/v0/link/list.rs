use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use common::prelude::LinkError;

use crate::http::api::v0::owner_from_headers;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSummary {
    pub slug: String,
    pub path: String,
    pub created_at: i64,
    pub duration_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub links: Vec<LinkSummary>,
}

/// List the caller's live links. Expired rows are swept before the
/// listing so the response never contains a dead slug.
pub async fn handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ListError> {
    let owner = owner_from_headers(&headers).ok_or(ListError::MissingOwner)?;

    let rows = state.links().list(&owner).await?;
    let links = rows
        .into_iter()
        .map(|row| LinkSummary {
            path: format!("/gw/{}", row.slug),
            slug: row.slug,
            created_at: row.created_at,
            duration_secs: row.duration_secs,
        })
        .collect();

    Ok(axum::Json(ListResponse { links }).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("missing owner header")]
    MissingOwner,
    #[error("link error: {0}")]
    Link(#[from] LinkError),
}

impl IntoResponse for ListError {
    fn into_response(self) -> Response {
        match self {
            ListError::MissingOwner => {
                (http::StatusCode::BAD_REQUEST, "missing x-owner header").into_response()
            }
            ListError::Link(_) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "unexpected error".to_string(),
            )
                .into_response(),
        }
    }
}
