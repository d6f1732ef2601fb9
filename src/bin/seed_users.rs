//! 初期ユーザーの投入
//!
//! 既に同じメールアドレスのユーザーが存在する場合はスキップする。

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use usergate::config::Config;
use usergate::models::normalize_email;
use usergate::repositories::{NewUser, UserRepository};
use usergate::services::auth::hash_password;

struct SeedUser {
    email: &'static str,
    full_name: &'static str,
    password: &'static str,
    is_staff: bool,
}

const SEED_USERS: &[SeedUser] = &[
    SeedUser {
        email: "admin@example.com",
        full_name: "Admin User",
        password: "admin12345",
        is_staff: true,
    },
    SeedUser {
        email: "user@example.com",
        full_name: "Regular User",
        password: "user12345",
        is_staff: false,
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    let db_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(config.database_url.expose_secret())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    let user_repo = UserRepository::new(db_pool);

    for seed in SEED_USERS {
        let email = normalize_email(seed.email);
        if user_repo.find_by_email(&email).await?.is_some() {
            tracing::info!(email = %email, "既存ユーザーのためスキップ");
            continue;
        }

        let password_hash = hash_password(seed.password)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
        let user = user_repo
            .create_user(&NewUser {
                email: &email,
                full_name: seed.full_name,
                password_hash: &password_hash,
                is_active: true,
                is_staff: seed.is_staff,
            })
            .await?;

        tracing::info!(user_id = %user.id, email = %user.email, "ユーザー作成");
    }

    Ok(())
}
