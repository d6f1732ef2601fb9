use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::AuthUser;
use crate::models::{User, normalize_email};
use crate::repositories::user::map_unique_email;
use crate::repositories::{NewUser, ProfileUpdate};
use crate::services::auth::hash_password;
use crate::state::AppState;

/// ユーザーの公開表現
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date_created: OffsetDateTime,
    pub is_active: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            date_created: user.created_at,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub password: String, // SecretBox不要（Deserialize後すぐハッシュ化）
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_is_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub detail: String,
    pub user_id: Uuid,
}

/// POST /api/users
///
/// # Security
/// - パスワードはログに出力しない
/// - パスワードは即座にハッシュ化
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    validate_create_request(&request)?;

    let email = normalize_email(&request.email);
    let password_hash = hash_password(&request.password)?;

    let user = state
        .user_repo
        .create_user(&NewUser {
            email: &email,
            full_name: request.full_name.trim(),
            password_hash: &password_hash,
            is_active: request.is_active,
            is_staff: false,
        })
        .await
        .map_err(map_unique_email)?;

    tracing::info!(user_id = %user.id, email = %user.email, "ユーザー作成");

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/users
pub async fn list_users(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.user_repo.list().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// GET /api/users/{id}
pub async fn get_user(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .user_repo
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;
    Ok(Json(user.into()))
}

/// PUT /api/users/{id}
///
/// email と full_name は必須
pub async fn update_user(
    auth: AuthUser,
    state: State<AppState>,
    path: Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if request.email.is_none() || request.full_name.is_none() {
        return Err(AppError::Validation(
            "email と full_name は必須です".to_string(),
        ));
    }
    partial_update_user(auth, state, path, Json(request)).await
}

/// PATCH /api/users/{id}
pub async fn partial_update_user(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    validate_update_request(&request)?;

    let email = request.email.as_deref().map(normalize_email);
    let update = ProfileUpdate {
        email: email.as_deref(),
        full_name: request.full_name.as_deref().map(str::trim),
        is_active: request.is_active,
    };

    let user = state
        .user_repo
        .update_profile(user_id, &update)
        .await
        .map_err(map_unique_email)?
        .ok_or(AppError::UserNotFound)?;

    tracing::info!(user_id = %user.id, actor_id = %actor.id, "ユーザー更新");

    Ok(Json(user.into()))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    AuthUser(actor): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.user_repo.delete(user_id).await? {
        return Err(AppError::UserNotFound);
    }

    tracing::info!(user_id = %user_id, actor_id = %actor.id, "ユーザー削除");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/users/deactivate_account
///
/// 認証ユーザー自身のアカウントを恒久的に無効化する
pub async fn deactivate_account(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DeactivateResponse>, AppError> {
    state.user_repo.deactivate(user.id).await?;

    tracing::info!(user_id = %user.id, "アカウント無効化");

    Ok(Json(DeactivateResponse {
        detail: "アカウントを恒久的に無効化しました".to_string(),
        user_id: user.id,
    }))
}

/// メールアドレスの形式チェック
pub(crate) fn validate_email(email: &str) -> Result<(), AppError> {
    if email.trim().is_empty() {
        return Err(AppError::Validation("メールアドレスは必須です".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::Validation(
            "有効なメールアドレスを入力してください".to_string(),
        ));
    }
    Ok(())
}

fn validate_create_request(request: &CreateUserRequest) -> Result<(), AppError> {
    validate_email(&request.email)?;
    if request.full_name.trim().is_empty() {
        return Err(AppError::Validation("氏名は必須です".to_string()));
    }
    // password: 8文字以上
    if request.password.len() < 8 {
        return Err(AppError::Validation(
            "パスワードは8文字以上で入力してください".to_string(),
        ));
    }
    Ok(())
}

fn validate_update_request(request: &UpdateUserRequest) -> Result<(), AppError> {
    if let Some(email) = &request.email {
        validate_email(email)?;
    }
    if let Some(full_name) = &request.full_name
        && full_name.trim().is_empty()
    {
        return Err(AppError::Validation("氏名は必須です".to_string()));
    }
    Ok(())
}
