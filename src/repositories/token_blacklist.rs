use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::BlacklistedToken;
use crate::services::auth::TokenBlacklist;

#[derive(Clone)]
pub struct TokenBlacklistRepository {
    pool: PgPool,
}

impl TokenBlacklistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// jti をブラックリストに登録
    ///
    /// # Returns
    /// 新規登録なら true、既に登録済みなら false
    pub async fn insert(
        &self,
        jti: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO token_blacklist (jti, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// jti でブラックリストを検索
    pub async fn find_by_jti(&self, jti: &str) -> Result<Option<BlacklistedToken>, sqlx::Error> {
        sqlx::query_as::<_, BlacklistedToken>(
            r#"
            SELECT jti, user_id, expires_at, blacklisted_at
            FROM token_blacklist
            WHERE jti = $1
            "#,
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await
    }
}

impl TokenBlacklist for TokenBlacklistRepository {
    async fn insert(
        &self,
        jti: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> Result<bool, AppError> {
        Ok(TokenBlacklistRepository::insert(self, jti, user_id, expires_at).await?)
    }

    async fn contains(&self, jti: &str) -> Result<bool, AppError> {
        Ok(self.find_by_jti(jti).await?.is_some())
    }
}
