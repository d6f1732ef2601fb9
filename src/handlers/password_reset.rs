use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::users::validate_email;
use crate::state::AppState;

// === リセットリクエスト ===

#[derive(Debug, Deserialize)]
pub struct ResetRequestRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /api/users/reset_password
///
/// 登録済みのメールアドレスにリセットリンクを送信する。未登録なら 404。
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<ResetRequestRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_email(&request.email)?;

    state
        .password_reset_service
        .request_reset(&request.email)
        .await?;

    Ok(Json(MessageResponse {
        message: "パスワード再設定用のリンクをメールで送信しました".to_string(),
    }))
}

// === トークン確認 ===

#[derive(Debug, Deserialize)]
pub struct ConfirmResetQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResetResponse {
    pub message: String,
    pub token: String,
}

/// GET /api/users/confirm_reset?token=...
///
/// トークンが利用可能か確認するだけで、状態は変更しない
pub async fn confirm_reset(
    State(state): State<AppState>,
    Query(query): Query<ConfirmResetQuery>,
) -> Result<Json<ConfirmResetResponse>, AppError> {
    let token = required_token(query.token.as_deref())?;

    state
        .password_reset_service
        .confirm_identity(token)
        .await?;

    Ok(Json(ConfirmResetResponse {
        message: "トークンは有効です。パスワードを変更できます".to_string(),
        token: token.to_string(),
    }))
}

// === パスワードリセット実行 ===

#[derive(Debug, Deserialize)]
pub struct ConfirmPasswordResetRequest {
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// POST /api/users/confirm_password_reset
///
/// # Security
/// - token, new_password はログに出力しない
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(request): Json<ConfirmPasswordResetRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_confirm_request(&request)?;

    state
        .password_reset_service
        .confirm_reset(
            &request.token,
            &request.new_password,
            &request.confirm_password,
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "パスワードを再設定しました".to_string(),
    }))
}

fn required_token(token: Option<&str>) -> Result<&str, AppError> {
    // 空白のみは未指定扱い。値そのものは加工せずサービスへ渡す
    match token {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(AppError::Validation(
            "トークンが指定されていません".to_string(),
        )),
    }
}

/// 形式チェックのみ（パスワード一致確認とトークン検証はサービス側）
fn validate_confirm_request(request: &ConfirmPasswordResetRequest) -> Result<(), AppError> {
    required_token(Some(request.token.as_str()))?;
    if request.new_password.is_empty() || request.confirm_password.is_empty() {
        return Err(AppError::Validation("パスワードは必須です".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirm_request(token: &str, new_password: &str, confirm_password: &str) -> ConfirmPasswordResetRequest {
        ConfirmPasswordResetRequest {
            token: token.to_string(),
            new_password: new_password.to_string(),
            confirm_password: confirm_password.to_string(),
        }
    }

    #[test]
    fn test_missing_token() {
        assert!(required_token(None).is_err());
        assert!(required_token(Some("")).is_err());
        assert!(required_token(Some("  ")).is_err());
    }

    #[test]
    fn test_token_present() {
        assert_eq!(required_token(Some("abc.def")).unwrap(), "abc.def");
    }

    #[test]
    fn test_token_passed_through_untrimmed() {
        // GET/POST どちらの経路でも同じ値がサービスへ渡る
        assert_eq!(required_token(Some(" abc.def ")).unwrap(), " abc.def ");
    }

    #[test]
    fn test_validate_empty_token() {
        let result = validate_confirm_request(&confirm_request("", "new1", "new1"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_empty_password() {
        let result = validate_confirm_request(&confirm_request("abc.def", "", "new1"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_mismatch_left_to_service() {
        let result = validate_confirm_request(&confirm_request("abc.def", "new1", "new2"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_query_without_token() {
        let query: ConfirmResetQuery = serde_json::from_str("{}").unwrap();
        assert!(query.token.is_none());
    }
}
