use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("認証エラー: {0}")]
    Authentication(String),

    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),

    #[error("このメールアドレスは既に使用されています")]
    EmailAlreadyExists,

    #[error("ユーザーが見つかりません")]
    UserNotFound,

    #[error("ユーザーアカウントは無効化されています")]
    AccountInactive,

    #[error("無効または期限切れのトークンです")]
    InvalidOrExpiredToken,

    #[error("パスワードが一致しません")]
    PasswordMismatch,

    #[error("トークンが無効、または既に無効化されています")]
    TokenInvalid,

    #[error("メール送信エラー: {0}")]
    Delivery(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    /// HTTP ステータスコードとクライアント向けメッセージ
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "メールアドレスまたはパスワードが正しくありません".to_string(),
            ),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::EmailAlreadyExists => (
                StatusCode::CONFLICT,
                "このメールアドレスは既に使用されています".to_string(),
            ),
            Self::UserNotFound => (
                StatusCode::NOT_FOUND,
                "ユーザーが見つかりません".to_string(),
            ),
            Self::AccountInactive => (
                StatusCode::FORBIDDEN,
                "ユーザーアカウントは無効化されています".to_string(),
            ),
            // 失敗理由（署名・用途・期限・保存値の不一致）は区別しない
            Self::InvalidOrExpiredToken => (
                StatusCode::BAD_REQUEST,
                "無効または期限切れのトークンです".to_string(),
            ),
            Self::PasswordMismatch => (
                StatusCode::BAD_REQUEST,
                "パスワードが一致しません".to_string(),
            ),
            Self::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                "トークンが無効、または既に無効化されています".to_string(),
            ),
            Self::Delivery(e) => {
                tracing::error!(error = %e, "メール送信エラー");
                (
                    StatusCode::BAD_GATEWAY,
                    "メールの送信に失敗しました".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
