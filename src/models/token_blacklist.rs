use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// ログアウト済みリフレッシュトークン
///
/// トークン本体は保存せず jti のみ記録する
#[derive(Debug, FromRow)]
pub struct BlacklistedToken {
    pub jti: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
    pub blacklisted_at: OffsetDateTime,
}
