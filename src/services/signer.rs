use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::{Duration, OffsetDateTime};

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// 鍵導出時に用途タグの前に付ける名前空間
const KEY_DERIVATION_PREFIX: &[u8] = b"usergate.signer.";

/// トークン検証の失敗理由（呼び出し側では区別せずに扱うこと）
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("トークン形式が不正")]
    Malformed,
    #[error("署名が一致しない")]
    BadSignature,
    #[error("トークンの有効期限切れ")]
    Expired,
}

/// 署名対象のクレーム
#[derive(Debug, Serialize, Deserialize)]
struct SignedClaims {
    /// 埋め込むペイロード
    sub: String,
    /// 発行時刻（UNIX秒）
    iat: i64,
    /// 同一秒内の発行でも別トークンになるようにするための乱数
    nonce: String,
}

/// 時間制限付き署名トークンの生成・検証
///
/// 形式: `base64url(claims JSON).base64url(HMAC-SHA256)`
///
/// 署名鍵はシークレットと用途タグ（salt）から導出するため、
/// ある用途で発行したトークンは別の用途では検証に失敗する。
#[derive(Clone)]
pub struct TokenSigner {
    secret: Arc<[u8]>,
}

impl TokenSigner {
    /// 新しい TokenSigner を作成
    ///
    /// # Security
    /// `secret` は機密情報のため、ログ出力禁止
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Arc::from(secret.as_bytes()),
        }
    }

    /// 現在時刻でペイロードに署名
    pub fn sign(&self, payload: &str, salt: &str) -> Result<String, AppError> {
        self.sign_at(payload, salt, OffsetDateTime::now_utc())
    }

    /// 指定した発行時刻でペイロードに署名
    pub fn sign_at(
        &self,
        payload: &str,
        salt: &str,
        issued_at: OffsetDateTime,
    ) -> Result<String, AppError> {
        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);

        let claims = SignedClaims {
            sub: payload.to_string(),
            iat: issued_at.unix_timestamp(),
            nonce: URL_SAFE_NO_PAD.encode(nonce),
        };
        let claims_json = serde_json::to_vec(&claims).map_err(|e| {
            tracing::error!(error = ?e, "署名クレームのシリアライズエラー");
            AppError::Internal(anyhow::anyhow!("claims serialization error"))
        })?;
        let body = URL_SAFE_NO_PAD.encode(claims_json);

        let mut mac = self.mac_for(salt)?;
        mac.update(body.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", body, signature))
    }

    /// 現在時刻を基準にトークンを検証し、ペイロードを返す
    pub fn verify(&self, token: &str, salt: &str, max_age: Duration) -> Result<String, SignatureError> {
        self.verify_at(token, salt, max_age, OffsetDateTime::now_utc())
    }

    /// `now` を基準にトークンを検証し、ペイロードを返す
    ///
    /// 署名・用途タグ・経過時間（0 以上 `max_age` 以下）のいずれかが不正なら失敗
    pub fn verify_at(
        &self,
        token: &str,
        salt: &str,
        max_age: Duration,
        now: OffsetDateTime,
    ) -> Result<String, SignatureError> {
        let (body, signature) = token.rsplit_once('.').ok_or(SignatureError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SignatureError::Malformed)?;

        let mut mac = self.mac_for(salt).map_err(|_| SignatureError::BadSignature)?;
        mac.update(body.as_bytes());
        // 定数時間比較
        mac.verify_slice(&signature)
            .map_err(|_| SignatureError::BadSignature)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| SignatureError::Malformed)?;
        let claims: SignedClaims =
            serde_json::from_slice(&claims_json).map_err(|_| SignatureError::Malformed)?;

        let age = now.unix_timestamp() - claims.iat;
        if age < 0 || age > max_age.whole_seconds() {
            return Err(SignatureError::Expired);
        }

        Ok(claims.sub)
    }

    /// 用途タグから導出した鍵で HMAC を初期化
    fn mac_for(&self, salt: &str) -> Result<HmacSha256, AppError> {
        let mut derive = new_mac(&self.secret)?;
        derive.update(KEY_DERIVATION_PREFIX);
        derive.update(salt.as_bytes());
        let derived_key = derive.finalize().into_bytes();

        new_mac(&derived_key)
    }
}

fn new_mac(key: &[u8]) -> Result<HmacSha256, AppError> {
    HmacSha256::new_from_slice(key).map_err(|e| {
        tracing::error!(error = ?e, "HMAC 初期化エラー");
        AppError::Internal(anyhow::anyhow!("hmac key error"))
    })
}
