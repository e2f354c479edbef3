//! `POST /unlock`: exchange a folder password for an access token.

use axum::{extract::State, Json};
use std::sync::Arc;
use tokio::time::Instant;

use crate::web::dto::{ApiResponse, UnlockRequest, UnlockResponse, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// POST /unlock - Verify a folder password.
///
/// Successful and failed attempts take at least the configured minimum
/// latency, so response timing does not tell them apart.
pub async fn unlock(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<UnlockRequest>,
) -> Result<Json<ApiResponse<UnlockResponse>>, ApiError> {
    let deadline = Instant::now() + state.unlock_min_latency;

    let result = state
        .gateway
        .unlock(&req.protected_path_token, &req.password)
        .await;

    tokio::time::sleep_until(deadline).await;

    let unlocked = result?;
    Ok(Json(ApiResponse::new(UnlockResponse {
        access_token: unlocked.access_token,
        token_type: "Bearer".to_string(),
        expires_in: unlocked.expires_in.as_secs(),
    })))
}
