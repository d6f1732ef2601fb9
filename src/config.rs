use secrecy::SecretBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    /// 署名用シークレット（リセットトークン・JWT 共通、ログ出力禁止）
    pub secret_key: SecretBox<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // メール設定
    #[serde(default = "default_from_email")]
    pub default_from_email: String,
    // SMTP設定（オプション - email機能有効時のみ使用）
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<SecretBox<String>>,
    pub smtp_password: Option<SecretBox<String>>,

    // パスワードリセット設定
    #[serde(default = "default_password_reset_url_base")]
    pub password_reset_url_base: String,
    #[serde(default = "default_password_reset_token_ttl_secs")]
    pub password_reset_token_ttl_secs: i64,

    // JWT 設定
    #[serde(default = "default_jwt_access_ttl_secs")]
    pub jwt_access_ttl_secs: i64,
    #[serde(default = "default_jwt_refresh_ttl_secs")]
    pub jwt_refresh_ttl_secs: i64,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FROM_EMAIL: &str = "webmaster@localhost";
const DEFAULT_PASSWORD_RESET_URL_BASE: &str = "http://localhost:8000/api/users/confirm_reset/";
const DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS: i64 = 3600;
const DEFAULT_JWT_ACCESS_TTL_SECS: i64 = 300;
const DEFAULT_JWT_REFRESH_TTL_SECS: i64 = 86400;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_from_email() -> String {
    DEFAULT_FROM_EMAIL.to_string()
}

fn default_password_reset_url_base() -> String {
    DEFAULT_PASSWORD_RESET_URL_BASE.to_string()
}

fn default_password_reset_token_ttl_secs() -> i64 {
    DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS
}

fn default_jwt_access_ttl_secs() -> i64 {
    DEFAULT_JWT_ACCESS_TTL_SECS
}

fn default_jwt_refresh_ttl_secs() -> i64 {
    DEFAULT_JWT_REFRESH_TTL_SECS
}

/// 有効期限の上限（365日）。これを超える値は時刻計算で溢れうるため受け付けない
const MAX_TTL_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),

    #[error("{name} は 1 以上 {max} 以下で指定してください（指定値: {value}）", max = MAX_TTL_SECS)]
    InvalidTtl { name: &'static str, value: i64 },
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config: Config = envy::from_env()?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        check_ttl(
            "PASSWORD_RESET_TOKEN_TTL_SECS",
            self.password_reset_token_ttl_secs,
        )?;
        check_ttl("JWT_ACCESS_TTL_SECS", self.jwt_access_ttl_secs)?;
        check_ttl("JWT_REFRESH_TTL_SECS", self.jwt_refresh_ttl_secs)?;
        Ok(self)
    }
}

fn check_ttl(name: &'static str, value: i64) -> Result<(), ConfigError> {
    if (1..=MAX_TTL_SECS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidTtl { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults_applied() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/usergate".to_string()),
            ("SECRET_KEY".to_string(), "test-secret".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();

        assert_eq!(config.secret_key.expose_secret(), "test-secret");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.password_reset_token_ttl_secs, 3600);
        assert_eq!(config.jwt_access_ttl_secs, 300);
        assert_eq!(config.default_from_email, "webmaster@localhost");
        assert!(config.smtp_host.is_none());
    }

    fn vars_with(name: &str, value: &str) -> Vec<(String, String)> {
        vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/usergate".to_string()),
            ("SECRET_KEY".to_string(), "test-secret".to_string()),
            (name.to_string(), value.to_string()),
        ]
    }

    #[test]
    fn test_default_ttls_pass_validation() {
        let config: Config = envy::from_iter(vars_with("PORT", "8000")).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        let config: Config =
            envy::from_iter(vars_with("PASSWORD_RESET_TOKEN_TTL_SECS", "0")).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTtl { name: "PASSWORD_RESET_TOKEN_TTL_SECS", value: 0 })
        ));

        let config: Config = envy::from_iter(vars_with("JWT_ACCESS_TTL_SECS", "-5")).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTtl { name: "JWT_ACCESS_TTL_SECS", .. })
        ));
    }

    #[test]
    fn test_huge_ttl_rejected() {
        let config: Config =
            envy::from_iter(vars_with("JWT_REFRESH_TTL_SECS", &i64::MAX.to_string())).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTtl { name: "JWT_REFRESH_TTL_SECS", .. })
        ));

        let config: Config =
            envy::from_iter(vars_with("JWT_REFRESH_TTL_SECS", &MAX_TTL_SECS.to_string())).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_secret_key_fails() {
        let vars = vec![(
            "DATABASE_URL".to_string(),
            "postgres://localhost/usergate".to_string(),
        )];
        let result: Result<Config, _> = envy::from_iter(vars);
        assert!(result.is_err());
    }
}
