use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use time::Duration;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::{TokenBlacklistRepository, UserRepository};
use crate::services::{
    AuthService, EmailService, JwtService, PasswordResetService, ResetSettings, TokenSigner,
};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// ユーザーリポジトリ
    pub user_repo: UserRepository,
    /// JWT 発行・検証
    pub jwt: JwtService,
    /// ログイン・トークン更新・ログアウト
    pub auth_service: AuthService,
    /// パスワードリセット
    pub password_reset_service: PasswordResetService,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(db_pool: PgPool, config: Config) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let secret = config.secret_key.expose_secret();

        let user_repo = UserRepository::new(db_pool.clone());
        let blacklist_repo = TokenBlacklistRepository::new(db_pool);
        let jwt = JwtService::new(
            secret,
            Duration::seconds(config.jwt_access_ttl_secs),
            Duration::seconds(config.jwt_refresh_ttl_secs),
        );
        let auth_service = AuthService::new(user_repo.clone(), blacklist_repo, jwt.clone());

        let email_service = EmailService::new(config.clone())?;
        let password_reset_service = PasswordResetService::new(
            user_repo.clone(),
            email_service,
            TokenSigner::new(secret),
            ResetSettings::from_config(&config),
        );

        Ok(Self {
            user_repo,
            jwt,
            auth_service,
            password_reset_service,
        })
    }
}
