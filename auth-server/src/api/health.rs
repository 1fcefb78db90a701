//! Health check endpoint

use axum::{Json, extract::State};

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = match state.users.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "User store ping failed");
            "degraded"
        }
    };

    Json(serde_json::json!({
        "status": status,
        "service": "auth-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
