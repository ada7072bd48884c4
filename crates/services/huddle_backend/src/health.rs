// File: crates/services/huddle_backend/src/health.rs
use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};
use huddle_db::TokenStore;
use serde::Serialize;
use tracing::warn;

use crate::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub publisher: bool,
    /// Stored tokens that the next use will have to refresh.
    pub expiring_tokens: Option<usize>,
    pub live_connections: usize,
}

/// Reports 503 when the database is unreachable or the publisher worker is gone.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.db_client.is_healthy().await;
    let publisher = !state.publisher.is_closed();

    let expiring_tokens = if database {
        let margin = Duration::try_seconds(state.config.tokens.refresh_margin_seconds)
            .unwrap_or_else(Duration::zero);
        let before = Utc::now().checked_add_signed(margin).unwrap_or_else(Utc::now);
        match state.tokens.list_expiring(before).await {
            Ok(tokens) => Some(tokens.len()),
            Err(e) => {
                warn!("Could not count expiring tokens: {}", e);
                None
            }
        }
    } else {
        None
    };

    let healthy = database && publisher;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            database,
            publisher,
            expiring_tokens,
            live_connections: state.notifications.writer.registry().total_connections(),
        }),
    )
}
