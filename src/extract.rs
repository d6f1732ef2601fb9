use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use http::HeaderMap;
use http::header::AUTHORIZATION;

use crate::error::AppError;
use crate::models::User;
use crate::services::jwt::TokenType;
use crate::state::AppState;

/// 認証済みユーザー
///
/// `Authorization: Bearer <access token>` を検証し、有効なユーザーを取り出す。
/// トークン不正・ユーザー不在・無効化済みはすべて `AppError::TokenInvalid`。
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::TokenInvalid)?;
        let claims = state.jwt.decode(token, TokenType::Access)?;

        let user = state
            .user_repo
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::TokenInvalid)?;
        if !user.is_active {
            tracing::warn!(user_id = %user.id, "無効化済みユーザーのアクセス");
            return Err(AppError::TokenInvalid);
        }

        Ok(Self(user))
    }
}

/// Authorization ヘッダーから Bearer トークンを取り出す
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
