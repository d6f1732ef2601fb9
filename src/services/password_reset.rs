use std::future::Future;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{User, normalize_email};
use crate::repositories::UserRepository;
use crate::services::auth::hash_password;
use crate::services::email::{EmailService, Mailer, OutgoingEmail};
use crate::services::signer::TokenSigner;

/// パスワードリセット用トークンの用途タグ
pub const PASSWORD_RESET_SALT: &str = "password-reset";

/// リセットプロトコルが利用するアカウントストア
pub trait AccountStore {
    /// メールアドレス（正規化済み）でユーザーを検索
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, AppError>> + Send;

    /// リセットトークンと有効期限を保存（既存の値は上書き）
    fn store_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// パスワードハッシュを更新し、リセットトークンと有効期限をクリア
    fn complete_reset(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// パスワードリセット設定
#[derive(Debug, Clone)]
pub struct ResetSettings {
    /// トークンの最大有効期間（署名の max-age と保存期限の両方に使う）
    pub token_ttl: Duration,
    /// リセットリンクのベースURL（`?token=` が付与される）
    pub url_base: String,
    /// 送信元アドレス
    pub from_address: String,
}

impl ResetSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            token_ttl: Duration::seconds(config.password_reset_token_ttl_secs),
            url_base: config.password_reset_url_base.clone(),
            from_address: config.default_from_email.clone(),
        }
    }
}

/// パスワードリセットサービス
///
/// 1. `request_reset`: 署名トークンを発行してユーザーに保存し、リンクをメール送信
/// 2. `confirm_identity`: トークンが利用可能か確認（状態は変更しない）
/// 3. `confirm_reset`: トークンを再検証してパスワードを更新、トークンを破棄
///
/// トークン検証は「署名・用途・経過時間」と「保存済みトークンとの一致・期限」の二段階。
#[derive(Clone)]
pub struct PasswordResetService<S = UserRepository, M = EmailService> {
    store: S,
    mailer: M,
    signer: TokenSigner,
    settings: ResetSettings,
}

impl<S: AccountStore, M: Mailer> PasswordResetService<S, M> {
    /// 新しい PasswordResetService を作成
    pub fn new(store: S, mailer: M, signer: TokenSigner, settings: ResetSettings) -> Self {
        Self {
            store,
            mailer,
            signer,
            settings,
        }
    }

    /// パスワードリセットをリクエスト
    ///
    /// # Errors
    /// - ユーザー不在: `AppError::UserNotFound`（メールは送信しない）
    /// - メール送信失敗: `AppError::Delivery`
    ///
    /// # Note
    /// トークンはメール送信前に保存される。送信に失敗した場合も保存済みトークンは残り、
    /// 再リクエストで上書きされるまで保留状態になる。
    ///
    /// # Security
    /// トークン（平文）はログに出力しない
    pub async fn request_reset(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        tracing::info!(email = %email, "パスワードリセットリクエスト");

        let user = self.store.find_by_email(&email).await?.ok_or_else(|| {
            tracing::info!(email = %email, "パスワードリセット: ユーザー不在");
            AppError::UserNotFound
        })?;

        let issued_at = OffsetDateTime::now_utc();
        let token = self
            .signer
            .sign_at(&user.email, PASSWORD_RESET_SALT, issued_at)?;
        let expires_at = issued_at + self.settings.token_ttl;

        self.store
            .store_reset_token(user.id, &token, expires_at)
            .await?;

        let reset_url = self.build_reset_url(&token);
        let message = self.build_reset_email(&user.email, &reset_url);

        if let Err(e) = self.mailer.send(&message).await {
            tracing::warn!(
                user_id = %user.id,
                "リセットメール送信失敗（保存済みトークンは再リクエストまで残る）"
            );
            return Err(e);
        }

        tracing::info!(user_id = %user.id, "パスワードリセットメール送信完了");
        Ok(())
    }

    /// トークンがまだ利用可能か確認（読み取りのみ）
    pub async fn confirm_identity(&self, token: &str) -> Result<(), AppError> {
        let user = self.validate_token(token).await?;
        tracing::info!(user_id = %user.id, "リセットトークン確認");
        Ok(())
    }

    /// パスワードをリセット
    ///
    /// パスワードの一致確認はトークン検証より先に行う。
    ///
    /// # Security
    /// トークン・新パスワードはログに出力しない
    pub async fn confirm_reset(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AppError> {
        if new_password != confirm_password {
            return Err(AppError::PasswordMismatch);
        }

        let user = self.validate_token(token).await?;

        let password_hash = hash_password(new_password)?;
        self.store.complete_reset(user.id, &password_hash).await?;

        tracing::info!(user_id = %user.id, "パスワードリセット完了");
        Ok(())
    }

    /// 二段階のトークン検証
    ///
    /// 識別情報はトークンのペイロードのみから得る。失敗理由はすべて
    /// `AppError::InvalidOrExpiredToken` にまとめる。
    async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let email = self
            .signer
            .verify(token, PASSWORD_RESET_SALT, self.settings.token_ttl)
            .map_err(|e| {
                tracing::warn!(reason = %e, "リセットトークン検証失敗");
                AppError::InvalidOrExpiredToken
            })?;

        let Some(user) = self.store.find_by_email(&email).await? else {
            tracing::warn!("リセットトークン検証失敗: ユーザー不在");
            return Err(AppError::InvalidOrExpiredToken);
        };

        if !user.has_pending_reset(token, OffsetDateTime::now_utc()) {
            tracing::warn!(user_id = %user.id, "リセットトークン検証失敗: 保存値不一致または期限切れ");
            return Err(AppError::InvalidOrExpiredToken);
        }

        Ok(user)
    }

    /// リセットURLを構築
    fn build_reset_url(&self, token: &str) -> String {
        format!(
            "{}?token={}",
            self.settings.url_base,
            urlencoding::encode(token)
        )
    }

    fn build_reset_email(&self, to: &str, reset_url: &str) -> OutgoingEmail {
        let minutes = self.settings.token_ttl.whole_minutes();
        OutgoingEmail {
            subject: "パスワードの再設定".to_string(),
            body: format!(
                "以下のリンクからパスワードを再設定してください: {}\n\nこのリンクは{}分で失効します。",
                reset_url, minutes
            ),
            from: self.settings.from_address.clone(),
            to: vec![to.to_string()],
            html_body: Some(format!(
                r#"<h1>パスワードの再設定</h1>
<p>以下のリンクからパスワードを再設定してください:</p>
<a href="{}">パスワードを再設定する</a>
<p>このリンクは{}分で失効します。</p>"#,
                reset_url, minutes
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::services::auth::verify_password;

    const SECRET: &str = "test-secret";

    /// メールアドレスをキーにしたインメモリのアカウントストア
    #[derive(Clone, Default)]
    struct InMemoryAccountStore {
        users: Arc<Mutex<HashMap<String, User>>>,
    }

    impl InMemoryAccountStore {
        fn with_user(email: &str, password: &str) -> Self {
            let store = Self::default();
            let now = OffsetDateTime::now_utc();
            let user = User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                full_name: "Test User".to_string(),
                password_hash: hash_password(password).unwrap(),
                is_active: true,
                is_staff: false,
                reset_token: None,
                reset_token_expires_at: None,
                created_at: now,
                updated_at: now,
            };
            store.users.lock().unwrap().insert(email.to_string(), user);
            store
        }

        fn get(&self, email: &str) -> User {
            self.users.lock().unwrap().get(email).cloned().unwrap()
        }

        fn update(&self, email: &str, f: impl FnOnce(&mut User)) {
            let mut users = self.users.lock().unwrap();
            f(users.get_mut(email).unwrap());
        }

        fn update_by_id(&self, user_id: Uuid, f: impl FnOnce(&mut User)) {
            let mut users = self.users.lock().unwrap();
            if let Some(user) = users.values_mut().find(|u| u.id == user_id) {
                f(user);
            }
        }
    }

    impl AccountStore for InMemoryAccountStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
            Ok(self.users.lock().unwrap().get(email).cloned())
        }

        async fn store_reset_token(
            &self,
            user_id: Uuid,
            token: &str,
            expires_at: OffsetDateTime,
        ) -> Result<(), AppError> {
            self.update_by_id(user_id, |user| {
                user.reset_token = Some(token.to_string());
                user.reset_token_expires_at = Some(expires_at);
            });
            Ok(())
        }

        async fn complete_reset(&self, user_id: Uuid, password_hash: &str) -> Result<(), AppError> {
            self.update_by_id(user_id, |user| {
                user.password_hash = password_hash.to_string();
                user.reset_token = None;
                user.reset_token_expires_at = None;
            });
            Ok(())
        }
    }

    /// 送信内容を記録するメーラー
    #[derive(Clone, Default)]
    struct RecordingMailer {
        sent: Arc<Mutex<Vec<OutgoingEmail>>>,
        fail: bool,
    }

    impl RecordingMailer {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<OutgoingEmail> {
            self.sent.lock().unwrap().clone()
        }

        /// 最後に送信したメールのリンクからトークンを取り出す
        fn last_token(&self) -> String {
            let sent = self.sent();
            let body = &sent.last().unwrap().body;
            let encoded = body
                .split("?token=")
                .nth(1)
                .unwrap()
                .split_whitespace()
                .next()
                .unwrap();
            urlencoding::decode(encoded).unwrap().into_owned()
        }
    }

    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError> {
            if self.fail {
                return Err(AppError::Delivery("connection refused".to_string()));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn settings() -> ResetSettings {
        ResetSettings {
            token_ttl: Duration::hours(1),
            url_base: "http://localhost:8000/api/users/confirm_reset/".to_string(),
            from_address: "noreply@example.com".to_string(),
        }
    }

    fn service(
        store: &InMemoryAccountStore,
        mailer: &RecordingMailer,
    ) -> PasswordResetService<InMemoryAccountStore, RecordingMailer> {
        PasswordResetService::new(
            store.clone(),
            mailer.clone(),
            TokenSigner::new(SECRET),
            settings(),
        )
    }

    #[tokio::test]
    async fn test_request_then_confirm_identity() {
        let store = InMemoryAccountStore::with_user("a@x.com", "old-password");
        let mailer = RecordingMailer::default();
        let service = service(&store, &mailer);

        service.request_reset("a@x.com").await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["a@x.com".to_string()]);
        assert_eq!(sent[0].from, "noreply@example.com");
        assert!(sent[0].html_body.is_some());

        let token = mailer.last_token();
        let user = store.get("a@x.com");
        assert_eq!(user.reset_token.as_deref(), Some(token.as_str()));
        let expires_at = user.reset_token_expires_at.unwrap();
        let remaining = expires_at - OffsetDateTime::now_utc();
        assert!(remaining > Duration::minutes(59) && remaining <= Duration::hours(1));

        service.confirm_identity(&token).await.unwrap();
        // 読み取りのみなので何度でも確認できる
        service.confirm_identity(&token).await.unwrap();
        assert_eq!(store.get("a@x.com").reset_token, Some(token));
    }

    #[tokio::test]
    async fn test_full_reset_scenario() {
        let store = InMemoryAccountStore::with_user("a@x.com", "old-password");
        let mailer = RecordingMailer::default();
        let service = service(&store, &mailer);

        service.request_reset("a@x.com").await.unwrap();
        let t1 = mailer.last_token();

        service.confirm_identity(&t1).await.unwrap();
        service.confirm_reset(&t1, "new1", "new1").await.unwrap();

        let user = store.get("a@x.com");
        assert!(verify_password("new1", &user.password_hash).unwrap());
        assert!(!verify_password("old-password", &user.password_hash).unwrap());
        assert!(user.reset_token.is_none());
        assert!(user.reset_token_expires_at.is_none());

        let result = service.confirm_reset(&t1, "new1", "new1").await;
        assert!(matches!(result, Err(AppError::InvalidOrExpiredToken)));

        let result = service.confirm_identity(&t1).await;
        assert!(matches!(result, Err(AppError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_token_older_than_max_age_rejected() {
        let store = InMemoryAccountStore::with_user("a@x.com", "old-password");
        let mailer = RecordingMailer::default();
        let service = service(&store, &mailer);

        let now = OffsetDateTime::now_utc();
        let stale = TokenSigner::new(SECRET)
            .sign_at("a@x.com", PASSWORD_RESET_SALT, now - Duration::seconds(3601))
            .unwrap();
        // 保存値は一致・期限内にしておく
        store.update("a@x.com", |user| {
            user.reset_token = Some(stale.clone());
            user.reset_token_expires_at = Some(now + Duration::hours(1));
        });

        let result = service.confirm_identity(&stale).await;
        assert!(matches!(result, Err(AppError::InvalidOrExpiredToken)));

        let result = service.confirm_reset(&stale, "new1", "new1").await;
        assert!(matches!(result, Err(AppError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_stored_expiry_in_past_rejected() {
        let store = InMemoryAccountStore::with_user("a@x.com", "old-password");
        let mailer = RecordingMailer::default();
        let service = service(&store, &mailer);

        service.request_reset("a@x.com").await.unwrap();
        let token = mailer.last_token();
        store.update("a@x.com", |user| {
            user.reset_token_expires_at = Some(OffsetDateTime::now_utc() - Duration::seconds(1));
        });

        let result = service.confirm_identity(&token).await;
        assert!(matches!(result, Err(AppError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_second_request_supersedes_first_token() {
        let store = InMemoryAccountStore::with_user("a@x.com", "old-password");
        let mailer = RecordingMailer::default();
        let service = service(&store, &mailer);

        service.request_reset("a@x.com").await.unwrap();
        let t1 = mailer.last_token();
        service.request_reset("a@x.com").await.unwrap();
        let t2 = mailer.last_token();
        assert_ne!(t1, t2);

        let result = service.confirm_reset(&t1, "new1", "new1").await;
        assert!(matches!(result, Err(AppError::InvalidOrExpiredToken)));

        service.confirm_reset(&t2, "new2", "new2").await.unwrap();
        let user = store.get("a@x.com");
        assert!(verify_password("new2", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_password_mismatch_checked_before_token() {
        let store = InMemoryAccountStore::with_user("a@x.com", "old-password");
        let mailer = RecordingMailer::default();
        let service = service(&store, &mailer);

        service.request_reset("a@x.com").await.unwrap();
        let token = mailer.last_token();

        // 不正なトークンでも PasswordMismatch が返る
        let result = service.confirm_reset("garbage", "new1", "new2").await;
        assert!(matches!(result, Err(AppError::PasswordMismatch)));

        let result = service.confirm_reset(&token, "new1", "new2").await;
        assert!(matches!(result, Err(AppError::PasswordMismatch)));

        // トークンは消費されていない
        let user = store.get("a@x.com");
        assert_eq!(user.reset_token, Some(token));
        assert!(verify_password("old-password", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_unknown_email_not_found_and_no_mail() {
        let store = InMemoryAccountStore::with_user("a@x.com", "old-password");
        let mailer = RecordingMailer::default();
        let service = service(&store, &mailer);

        let result = service.request_reset("nobody@x.com").await;
        assert!(matches!(result, Err(AppError::UserNotFound)));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_request_normalizes_email() {
        let store = InMemoryAccountStore::with_user("a@x.com", "old-password");
        let mailer = RecordingMailer::default();
        let service = service(&store, &mailer);

        service.request_reset("  a@X.COM ").await.unwrap();
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_persisted_token() {
        let store = InMemoryAccountStore::with_user("a@x.com", "old-password");
        let mailer = RecordingMailer::failing();
        let service = service(&store, &mailer);

        let result = service.request_reset("a@x.com").await;
        assert!(matches!(result, Err(AppError::Delivery(_))));

        let user = store.get("a@x.com");
        assert!(user.reset_token.is_some());
        assert!(user.reset_token_expires_at.is_some());
    }

    #[tokio::test]
    async fn test_token_for_other_purpose_rejected() {
        let store = InMemoryAccountStore::with_user("a@x.com", "old-password");
        let mailer = RecordingMailer::default();
        let service = service(&store, &mailer);

        let token = TokenSigner::new(SECRET)
            .sign("a@x.com", "email-verification")
            .unwrap();
        store.update("a@x.com", |user| {
            user.reset_token = Some(token.clone());
            user.reset_token_expires_at = Some(OffsetDateTime::now_utc() + Duration::hours(1));
        });

        let result = service.confirm_identity(&token).await;
        assert!(matches!(result, Err(AppError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_token_signed_for_unknown_account_rejected() {
        let store = InMemoryAccountStore::with_user("a@x.com", "old-password");
        let mailer = RecordingMailer::default();
        let service = service(&store, &mailer);

        let token = TokenSigner::new(SECRET)
            .sign("ghost@x.com", PASSWORD_RESET_SALT)
            .unwrap();

        let result = service.confirm_identity(&token).await;
        assert!(matches!(result, Err(AppError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_reset_link_uses_configured_base() {
        let store = InMemoryAccountStore::with_user("a@x.com", "old-password");
        let mailer = RecordingMailer::default();
        let service = service(&store, &mailer);

        service.request_reset("a@x.com").await.unwrap();
        let sent = mailer.sent();
        assert!(
            sent[0]
                .body
                .contains("http://localhost:8000/api/users/confirm_reset/?token=")
        );
        assert!(sent[0].body.contains("60分"));
    }
}
