use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::users::{UserResponse, validate_email};
use crate::services::TokenPair;
use crate::state::AppState;

/// ログインリクエスト
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// ユーザーのメールアドレス
    pub email: String,
    /// ユーザーのパスワード
    pub password: String,
}

/// ログインレスポンス
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: UserResponse,
}

/// 独自ログインレスポンスのユーザー情報
#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Serialize)]
pub struct CustomLoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: LoginUser,
}

/// ログインハンドラー
///
/// POST /api/users/login, POST /api/token
///
/// ユーザー不在とパスワード不一致は区別せず 401 を返す。
/// 無効化済みアカウントは 403。
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_login_request(&request)?;

    let (user, tokens) = state
        .auth_service
        .login(&request.email, &request.password)
        .await
        .map_err(hide_unknown_user)?;

    Ok(Json(LoginResponse {
        tokens,
        user: user.into(),
    }))
}

/// 独自認証ハンドラー
///
/// POST /api/auth/login
///
/// 失敗理由を区別して返す:
/// ユーザー不在 404、パスワード不一致 401、無効化済み 403
pub async fn custom_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<CustomLoginResponse>, AppError> {
    validate_login_request(&request)?;

    let (user, tokens) = state
        .auth_service
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(CustomLoginResponse {
        tokens,
        user: LoginUser {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
        },
    }))
}

/// ユーザー不在をパスワード不一致と同じエラーにする
fn hide_unknown_user(e: AppError) -> AppError {
    match e {
        AppError::UserNotFound => AppError::Authentication("invalid_credentials".to_string()),
        other => other,
    }
}

/// ログインリクエストのバリデーション
fn validate_login_request(request: &LoginRequest) -> Result<(), AppError> {
    validate_email(&request.email)?;

    if request.password.is_empty() {
        return Err(AppError::Validation("パスワードは必須です".to_string()));
    }

    Ok(())
}
