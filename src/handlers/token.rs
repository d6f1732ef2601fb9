use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// POST /api/token/refresh
///
/// ブラックリスト済みのリフレッシュトークンは拒否
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    if request.refresh.trim().is_empty() {
        return Err(AppError::Validation("refresh は必須です".to_string()));
    }

    let access = state.auth_service.refresh(&request.refresh).await?;

    Ok(Json(RefreshResponse { access }))
}
