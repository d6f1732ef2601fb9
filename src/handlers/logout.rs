use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extract::AuthUser;
use crate::state::AppState;

/// ログアウトリクエスト
#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    /// 無効化するリフレッシュトークン
    pub refresh_token: String,
}

/// ログアウトレスポンス
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// ログアウトハンドラー
///
/// POST /api/users/logout
///
/// 処理フロー:
/// 1. アクセストークンで認証
/// 2. リクエストバリデーション
/// 3. リフレッシュトークンをブラックリストに登録
pub async fn logout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<LogoutRequest>,
) -> Result<Json<LogoutResponse>, AppError> {
    validate_logout_request(&request)?;

    state.auth_service.logout(&request.refresh_token).await?;

    tracing::info!(user_id = %user.id, "ログアウト");

    Ok(Json(LogoutResponse {
        message: "ログアウトしました".to_string(),
    }))
}

/// ログアウトリクエストのバリデーション
fn validate_logout_request(request: &LogoutRequest) -> Result<(), AppError> {
    if request.refresh_token.trim().is_empty() {
        return Err(AppError::Validation(
            "refresh_token は必須です".to_string(),
        ));
    }

    Ok(())
}
