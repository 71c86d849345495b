use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use common::prelude::{ReconcileError, StoreError};

use crate::http::api::v0::owner_from_headers;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightReport {
    pub height: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub name: String,
    pub format: String,
    /// Derived heights generated for the owner's tier
    pub heights: Vec<u32>,
    /// Heights whose generation failed; the upload itself still succeeded
    pub failed: Vec<HeightReport>,
}

/// Create an asset from a multipart form (`name` + `file`) and bring its
/// derived set in line with the owner's tier.
pub async fn handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, UploadError> {
    let owner = owner_from_headers(&headers).ok_or(UploadError::MissingOwner)?;

    let mut name: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.to_string()))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "name" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| UploadError::Multipart(e.to_string()))?;
                name = Some(text);
            }
            "file" => {
                // Browsers may send a full client-side path; keep only
                // the final component.
                let filename = field
                    .file_name()
                    .and_then(|s| s.rsplit(['/', '\\']).next())
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "upload".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| UploadError::Multipart(e.to_string()))?
                    .to_vec();
                file = Some((filename, data));
            }
            _ => {
                tracing::warn!("ignoring unknown field: {}", field_name);
            }
        }
    }

    let name = name.ok_or_else(|| UploadError::InvalidRequest("name is required".into()))?;
    let (filename, data) =
        file.ok_or_else(|| UploadError::InvalidRequest("file is required".into()))?;
    if name.is_empty() || name.contains('/') {
        return Err(UploadError::InvalidRequest(
            "name must be a non-empty path segment".into(),
        ));
    }

    tracing::info!(owner = %owner, asset = %name, size = data.len(), "uploading asset");

    let asset = state.store().create_asset(&owner, &name, &filename, data).await?;

    // Asset creation is a reconciliation trigger
    let tier = state.reconciler().tier_for_owner(&owner).await?;
    let outcome = state.reconciler().reconcile(&asset, &tier).await?;

    Ok((
        http::StatusCode::CREATED,
        axum::Json(UploadResponse {
            name: asset.name,
            format: asset.original_format.as_str().to_string(),
            heights: outcome.added.into_iter().collect(),
            failed: outcome
                .failed
                .into_iter()
                .map(|f| HeightReport {
                    height: f.height,
                    error: f.error,
                })
                .collect(),
        }),
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("missing owner header")]
    MissingOwner,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("multipart error: {0}")]
    Multipart(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        match self {
            UploadError::MissingOwner => {
                (http::StatusCode::BAD_REQUEST, "missing x-owner header").into_response()
            }
            UploadError::InvalidRequest(msg) | UploadError::Multipart(msg) => {
                (http::StatusCode::BAD_REQUEST, format!("bad request: {}", msg)).into_response()
            }
            UploadError::Store(StoreError::UnsupportedFormat) => (
                http::StatusCode::UNPROCESSABLE_ENTITY,
                "image must be a PNG or a JPEG".to_string(),
            )
                .into_response(),
            UploadError::Store(StoreError::AssetExists(_)) => (
                http::StatusCode::CONFLICT,
                "that asset name already exists".to_string(),
            )
                .into_response(),
            UploadError::Store(StoreError::ProfileNotFound(_))
            | UploadError::Reconcile(ReconcileError::Store(StoreError::ProfileNotFound(_))) => (
                http::StatusCode::NOT_FOUND,
                "unknown owner".to_string(),
            )
                .into_response(),
            UploadError::Store(_) | UploadError::Reconcile(_) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "unexpected error".to_string(),
            )
                .into_response(),
        }
    }
}
