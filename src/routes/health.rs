use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub event_store: String,
    pub store_backend: &'static str,
    pub redis: String,
}

/// Health check endpoint - public
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let store = state.events.store();
    let redis = async {
        match &state.cache {
            Some(cache) => Some(cache.health_check().await.is_ok()),
            None => None,
        }
    };
    let (store_ok, redis_ok) = tokio::join!(store.health_check(), redis);

    // The store is critical; Redis is only a cache
    let status = match (store_ok, redis_ok) {
        (false, _) => "unhealthy",
        (true, Some(false)) => "degraded",
        (true, _) => "healthy",
    };
    let status_code = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let redis_status = match redis_ok {
        Some(true) => "ok",
        Some(false) => "error",
        None => "disabled",
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services: ServiceHealth {
                event_store: if store_ok { "ok" } else { "error" }.to_string(),
                store_backend: store.backend_tag(),
                redis: redis_status.to_string(),
            },
        }),
    )
}
