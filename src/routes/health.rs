use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub users: usize,
    pub last_refresh: Option<String>,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let last_refresh = state
        .latest
        .read()
        .await
        .as_ref()
        .map(|latest| latest.refreshed_at.to_rfc3339());

    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        users: state.store.user_count().await,
        last_refresh,
    };

    (StatusCode::OK, Json(response))
}
