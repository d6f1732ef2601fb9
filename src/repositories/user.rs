use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::User;
use crate::services::auth::UserLookup;
use crate::services::password_reset::AccountStore;

const USER_COLUMNS: &str = "id, email, full_name, password_hash, is_active, is_staff, \
     reset_token, reset_token_expires_at, created_at, updated_at";

/// 新規ユーザー作成パラメータ
#[derive(Debug)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub full_name: &'a str,
    pub password_hash: &'a str,
    pub is_active: bool,
    pub is_staff: bool,
}

/// プロフィール更新パラメータ（None のフィールドは変更しない）
#[derive(Debug, Default)]
pub struct ProfileUpdate<'a> {
    pub email: Option<&'a str>,
    pub full_name: Option<&'a str>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// DB 疎通確認
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// メールアドレスでユーザーを検索
    ///
    /// # Note
    /// 完全一致で検索する。正規化は呼び出し側で行うこと
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// ユーザーIDでユーザーを検索
    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// 全ユーザーを作成日時順で取得
    pub async fn list(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await
    }

    /// 新しいユーザーを作成
    ///
    /// # Errors
    /// - UNIQUE制約違反時: `sqlx::Error::Database` (constraint = "users_email_key")
    ///   呼び出し側で `AppError::EmailAlreadyExists` に変換すること
    pub async fn create_user(&self, new_user: &NewUser<'_>) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, full_name, password_hash, is_active, is_staff)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new_user.email)
        .bind(new_user.full_name)
        .bind(new_user.password_hash)
        .bind(new_user.is_active)
        .bind(new_user.is_staff)
        .fetch_one(&self.pool)
        .await
    }

    /// プロフィールを更新
    ///
    /// # Returns
    /// 更新後のユーザー（存在しない場合は None）
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate<'_>,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                full_name = COALESCE($3, full_name),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(update.email)
        .bind(update.full_name)
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await
    }

    /// ユーザーを削除
    ///
    /// # Returns
    /// 削除されたかどうか
    pub async fn delete(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// アカウントを無効化（再有効化はこの API からは行わない）
    pub async fn deactivate(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// リセットトークンと有効期限を保存（既存の保留トークンは上書き）
    pub async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token = $2, reset_token_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// パスワードを更新し、リセットトークンをクリア
    ///
    /// # Note
    /// password_hash はログに出力しないこと
    pub async fn update_password_and_clear_reset(
        &self,
        user_id: Uuid,
        new_password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                reset_token = NULL,
                reset_token_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(new_password_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl AccountStore for UserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(UserRepository::find_by_email(self, email).await?)
    }

    async fn store_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError> {
        Ok(self.set_reset_token(user_id, token, expires_at).await?)
    }

    async fn complete_reset(&self, user_id: Uuid, password_hash: &str) -> Result<(), AppError> {
        Ok(self
            .update_password_and_clear_reset(user_id, password_hash)
            .await?)
    }
}

impl UserLookup for UserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(UserRepository::find_by_email(self, email).await?)
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(UserRepository::find_by_id(self, user_id).await?)
    }
}

/// UNIQUE制約違反（メール重複）を `AppError::EmailAlreadyExists` に変換
pub fn map_unique_email(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e
        && db_err.constraint() == Some("users_email_key")
    {
        return AppError::EmailAlreadyExists;
    }
    AppError::Database(e)
}
