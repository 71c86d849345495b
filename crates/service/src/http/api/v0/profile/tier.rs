use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use common::prelude::{ReconcileError, StoreError};

use crate::http::api::v0::owner_from_headers;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTierRequest {
    pub tier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetOutcome {
    pub asset: String,
    pub added: Vec<u32>,
    pub removed: Vec<u32>,
    pub failed: Vec<u32>,
    /// Set when the whole pass for this asset failed
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTierResponse {
    pub tier: String,
    pub outcomes: Vec<AssetOutcome>,
}

/// Move the caller's profile to a different tier. The tier column is
/// committed first, then every asset is reconciled against the new tier;
/// per-asset failures are reported, not rolled back.
pub async fn handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<SetTierRequest>,
) -> Result<impl IntoResponse, SetTierError> {
    let owner = owner_from_headers(&headers).ok_or(SetTierError::MissingOwner)?;

    let db = state.store().database();
    if db.get_tier(&request.tier).await?.is_none() {
        return Err(SetTierError::TierNotFound(request.tier));
    }
    db.set_profile_tier(&owner, &request.tier).await?;
    tracing::info!(owner = %owner, tier = %request.tier, "tier reassigned");

    let entries = state.reconciler().reconcile_owner(&owner).await?;
    let outcomes = entries
        .into_iter()
        .map(|entry| match entry.result {
            Ok(outcome) => AssetOutcome {
                asset: entry.asset,
                added: outcome.added.iter().copied().collect(),
                removed: outcome.removed.iter().copied().collect(),
                failed: outcome.failed.iter().map(|f| f.height).collect(),
                error: None,
            },
            Err(e) => AssetOutcome {
                asset: entry.asset,
                added: Vec::new(),
                removed: Vec::new(),
                failed: Vec::new(),
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(axum::Json(SetTierResponse {
        tier: request.tier,
        outcomes,
    })
    .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum SetTierError {
    #[error("missing owner header")]
    MissingOwner,
    #[error("tier not found: {0}")]
    TierNotFound(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),
}

impl IntoResponse for SetTierError {
    fn into_response(self) -> Response {
        match self {
            SetTierError::MissingOwner => {
                (http::StatusCode::BAD_REQUEST, "missing x-owner header").into_response()
            }
            SetTierError::TierNotFound(name) => (
                http::StatusCode::NOT_FOUND,
                format!("tier not found: {}", name),
            )
                .into_response(),
            SetTierError::Store(StoreError::ProfileNotFound(_)) => {
                (http::StatusCode::NOT_FOUND, "unknown owner".to_string()).into_response()
            }
            SetTierError::Store(_) | SetTierError::Reconcile(_) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "unexpected error".to_string(),
            )
                .into_response(),
        }
    }
}
