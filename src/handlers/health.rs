use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::AppState;

/// ヘルスチェックレスポンス
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

impl HealthResponse {
    fn new(database_ok: bool) -> (StatusCode, Self) {
        let (status_code, status, database) = if database_ok {
            (StatusCode::OK, "ok", "ok")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unavailable")
        };
        (
            status_code,
            Self {
                status,
                database,
                version: env!("CARGO_PKG_VERSION"),
            },
        )
    }
}

/// ヘルスチェックハンドラー
///
/// GET /api/health
///
/// DB に到達できない場合は 503 を返す
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = match state.user_repo.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = ?e, "ヘルスチェック: データベース接続失敗");
            false
        }
    };

    let (status_code, response) = HealthResponse::new(database_ok);
    (status_code, Json(response))
}
