use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(skip)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    /// 最後に発行したパスワードリセットトークン（平文、ログ出力禁止）
    #[serde(skip)]
    pub reset_token: Option<String>,
    /// `reset_token` と同時に設定・クリアされる
    #[serde(skip)]
    pub reset_token_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// 保留中のリセットトークンが `token` と一致し、かつ `now` 時点で期限内か
    pub fn has_pending_reset(&self, token: &str, now: OffsetDateTime) -> bool {
        match (&self.reset_token, self.reset_token_expires_at) {
            (Some(stored), Some(expires_at)) => stored == token && expires_at >= now,
            _ => false,
        }
    }
}

/// メールアドレスを正規化する
///
/// 前後の空白を除去し、ドメイン部のみ小文字化する（ローカル部は大文字小文字を保持）。
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}
