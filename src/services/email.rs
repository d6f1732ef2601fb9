use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;

/// 送信するメール
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub subject: String,
    /// プレーンテキスト本文
    pub body: String,
    pub from: String,
    pub to: Vec<String>,
    /// HTML 本文（指定時は multipart/alternative で送信）
    pub html_body: Option<String>,
}

/// メール送信の抽象
///
/// 送信失敗は `AppError::Delivery` で返す。リトライは行わない。
pub trait Mailer {
    fn send(&self, email: &OutgoingEmail) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// メール送信サービス
///
/// `email` フィーチャー有効かつ SMTP 設定がある場合は lettre で送信し、
/// それ以外はログ出力のみ（開発モード）。
#[derive(Clone)]
pub struct EmailService {
    #[cfg(feature = "email")]
    transport: Option<lettre::AsyncSmtpTransport<lettre::Tokio1Executor>>,
}

impl EmailService {
    /// 新しい EmailService を作成
    #[cfg(feature = "email")]
    pub fn new(config: Arc<Config>) -> Result<Self, AppError> {
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, Tokio1Executor};
        use secrecy::ExposeSecret;

        let Some(host) = &config.smtp_host else {
            tracing::info!("SMTP 未設定（開発モード: ログ出力のみ）");
            return Ok(Self { transport: None });
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| {
                tracing::error!(error = ?e, smtp_host = %host, "SMTP トランスポートの初期化に失敗");
                AppError::Internal(anyhow::anyhow!("invalid smtp relay: {}", e))
            })?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(
                username.expose_secret().clone(),
                password.expose_secret().clone(),
            ));
        }

        tracing::info!(smtp_host = %host, smtp_port = config.smtp_port, "SMTP トランスポート初期化完了");

        Ok(Self {
            transport: Some(builder.build()),
        })
    }

    /// 新しい EmailService を作成（開発モード: ログ出力のみ）
    #[cfg(not(feature = "email"))]
    pub fn new(config: Arc<Config>) -> Result<Self, AppError> {
        if config.smtp_host.is_some() {
            tracing::warn!("SMTP が設定されていますが email フィーチャーが無効です（ログ出力のみ）");
        }
        Ok(Self {})
    }
}

impl Mailer for EmailService {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError> {
        #[cfg(feature = "email")]
        if let Some(transport) = &self.transport {
            return send_smtp(transport, email).await;
        }

        // 開発モード: 本文にはリセットリンク等の機密が含まれるためデバッグレベルで出力
        tracing::info!(
            to = ?email.to,
            subject = %email.subject,
            "メール送信（開発モード）"
        );
        tracing::debug!(body = %email.body, "メール本文");

        Ok(())
    }
}

#[cfg(feature = "email")]
async fn send_smtp(
    transport: &lettre::AsyncSmtpTransport<lettre::Tokio1Executor>,
    email: &OutgoingEmail,
) -> Result<(), AppError> {
    use lettre::message::{MultiPart, header::ContentType};
    use lettre::{AsyncTransport, Message};

    let from = email
        .from
        .parse()
        .map_err(|e| AppError::Delivery(format!("invalid from address: {}", e)))?;
    let mut builder = Message::builder().from(from).subject(email.subject.clone());
    for to in &email.to {
        let mailbox = to
            .parse()
            .map_err(|e| AppError::Delivery(format!("invalid to address: {}", e)))?;
        builder = builder.to(mailbox);
    }

    let message = match &email.html_body {
        Some(html) => builder.multipart(MultiPart::alternative_plain_html(
            email.body.clone(),
            html.clone(),
        )),
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone()),
    }
    .map_err(|e| AppError::Delivery(format!("failed to build message: {}", e)))?;

    transport
        .send(message)
        .await
        .map_err(|e| AppError::Delivery(e.to_string()))?;

    tracing::info!(to = ?email.to, subject = %email.subject, "メール送信完了");

    Ok(())
}
