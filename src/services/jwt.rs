use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::AppError;

/// トークン種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT クレーム
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// ユーザーID
    pub sub: Uuid,
    pub token_type: TokenType,
    /// トークンID（ブラックリスト照合用）
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// アクセストークン・リフレッシュトークンの組
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

/// JWT の発行・検証（HS256）
///
/// # Security
/// 署名鍵はログに出力しない
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtService {
    /// 新しい JwtService を作成
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    /// アクセストークンとリフレッシュトークンを発行
    pub fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            refresh: self.issue(user_id, TokenType::Refresh, self.refresh_ttl)?,
            access: self.issue_access(user_id)?,
        })
    }

    /// アクセストークンを発行
    pub fn issue_access(&self, user_id: Uuid) -> Result<String, AppError> {
        self.issue(user_id, TokenType::Access, self.access_ttl)
    }

    fn issue(&self, user_id: Uuid, token_type: TokenType, ttl: Duration) -> Result<String, AppError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user_id,
            token_type,
            jti: Uuid::new_v4().simple().to_string(),
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = ?e, "JWT 生成エラー");
            AppError::Internal(anyhow::anyhow!("jwt encode error"))
        })
    }

    /// トークンを検証してクレームを返す
    ///
    /// 署名不正・期限切れ・種別不一致はすべて `AppError::TokenInvalid`
    pub fn decode(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = ?e, "JWT 検証失敗");
                AppError::TokenInvalid
            })?
            .claims;

        if claims.token_type != expected {
            tracing::debug!(
                expected = ?expected,
                actual = ?claims.token_type,
                "JWT 種別不一致"
            );
            return Err(AppError::TokenInvalid);
        }

        Ok(claims)
    }
}
