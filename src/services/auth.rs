use std::future::Future;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{User, normalize_email};
use crate::repositories::{TokenBlacklistRepository, UserRepository};
use crate::services::jwt::{JwtService, TokenPair, TokenType};

/// タイミング攻撃対策用のダミーハッシュ（どのパスワードとも一致しない）
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$dXNlcmdhdGUtZHVtbXkhIQ$BwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyAhIiMkJSY";

/// 認証で利用するユーザー検索
pub trait UserLookup {
    /// メールアドレス（正規化済み）でユーザーを検索
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, AppError>> + Send;

    /// ユーザーIDでユーザーを検索
    fn find_by_id(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<User>, AppError>> + Send;
}

/// ログアウト済みリフレッシュトークンの記録
pub trait TokenBlacklist {
    /// jti を登録する。既に登録済みなら false
    fn insert(
        &self,
        jti: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// jti が登録済みか
    fn contains(&self, jti: &str) -> impl Future<Output = Result<bool, AppError>> + Send;
}

/// パスワードをargon2idでハッシュ化
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = ?e, "パスワードハッシュ生成エラー");
            AppError::Internal(anyhow::anyhow!("password hash error"))
        })?;
    Ok(hash.to_string())
}

/// パスワードを検証
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        tracing::error!(error = ?e, "パスワードハッシュのパースエラー");
        AppError::Internal(anyhow::anyhow!("password hash parse error"))
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// 認証サービス（ログイン・トークン更新・ログアウト）
#[derive(Clone)]
pub struct AuthService<U = UserRepository, B = TokenBlacklistRepository> {
    users: U,
    blacklist: B,
    jwt: JwtService,
}

impl<U: UserLookup, B: TokenBlacklist> AuthService<U, B> {
    /// 新しい AuthService を作成
    pub fn new(users: U, blacklist: B, jwt: JwtService) -> Self {
        Self {
            users,
            blacklist,
            jwt,
        }
    }

    /// ユーザー認証を実行
    ///
    /// # Errors
    /// - ユーザー不在: `AppError::UserNotFound`
    /// - パスワード不一致: `AppError::Authentication`
    /// - 無効化済みアカウント: `AppError::AccountInactive`
    ///
    /// エラーの区別をクライアントに見せるかどうかはハンドラー側で決める。
    /// タイミング攻撃対策: ユーザーが存在しない場合もダミーのパスワード検証を実行
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            let _ = verify_password(password, DUMMY_HASH);
            tracing::warn!(email = %email, "認証失敗: ユーザー不在");
            return Err(AppError::UserNotFound);
        };

        if !verify_password(password, &user.password_hash)? {
            tracing::warn!(email = %email, "認証失敗: パスワード不一致");
            return Err(AppError::Authentication("invalid_credentials".to_string()));
        }

        if !user.is_active {
            tracing::warn!(email = %email, "認証失敗: 無効化済みアカウント");
            return Err(AppError::AccountInactive);
        }

        tracing::info!(user_id = %user.id, "認証成功");
        Ok(user)
    }

    /// 認証してアクセストークン・リフレッシュトークンを発行
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, TokenPair), AppError> {
        let user = self.authenticate(email, password).await?;
        let tokens = self.jwt.issue_pair(user.id)?;
        Ok((user, tokens))
    }

    /// リフレッシュトークンから新しいアクセストークンを発行
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        let claims = self.jwt.decode(refresh_token, TokenType::Refresh)?;

        if self.blacklist.contains(&claims.jti).await? {
            tracing::warn!(user_id = %claims.sub, "ブラックリスト済みリフレッシュトークン");
            return Err(AppError::TokenInvalid);
        }

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::TokenInvalid)?;
        if !user.is_active {
            return Err(AppError::TokenInvalid);
        }

        self.jwt.issue_access(user.id)
    }

    /// リフレッシュトークンをブラックリストに登録してログアウト
    ///
    /// # Security
    /// トークン文字列はログに出力しない
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        let claims = self.jwt.decode(refresh_token, TokenType::Refresh)?;
        let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp).map_err(|e| {
            tracing::error!(error = ?e, "JWT exp の変換エラー");
            AppError::TokenInvalid
        })?;

        let inserted = self
            .blacklist
            .insert(&claims.jti, claims.sub, expires_at)
            .await?;
        if !inserted {
            tracing::warn!(user_id = %claims.sub, "既にブラックリスト済みのトークン");
            return Err(AppError::TokenInvalid);
        }

        tracing::info!(user_id = %claims.sub, "ログアウト完了");
        Ok(())
    }
}
