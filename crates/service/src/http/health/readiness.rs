use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::time::Duration;
use tokio::time::timeout;

use crate::ServiceState;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Ready when the record store answers a trivial query.
pub async fn handler(State(state): State<ServiceState>) -> Response {
    let check = state.store().database().list_tiers();
    match timeout(HEALTH_CHECK_TIMEOUT, check).await {
        Ok(Ok(_)) => {
            let msg = serde_json::json!({"status": "ok"});
            (StatusCode::OK, Json(msg)).into_response()
        }
        Ok(Err(e)) => {
            let msg = serde_json::json!({
                "status": "failure",
                "message": format!("record store unavailable: {}", e)
            });
            (StatusCode::SERVICE_UNAVAILABLE, Json(msg)).into_response()
        }
        Err(_) => {
            let msg = serde_json::json!({
                "status": "failure",
                "message": "health check timed out"
            });
            (StatusCode::SERVICE_UNAVAILABLE, Json(msg)).into_response()
        }
    }
}
