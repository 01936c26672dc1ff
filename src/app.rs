use axum::{http::HeaderValue, Router};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::JwksCache;
use crate::config::Settings;
use crate::error::ApiError;
use crate::middleware::{request_id_layer, MAX_BODY_BYTES, X_REQUEST_ID};
use crate::routes;
use crate::services::{EventService, RedisCache};

/// Shared application state
pub struct AppState {
    pub settings: Settings,
    pub events: EventService,
    pub jwks_cache: JwksCache,
    /// Present when events live in Postgres; notifications are stored there too
    pub db: Option<PgPool>,
    pub cache: Option<RedisCache>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        events: EventService,
        jwks_cache: JwksCache,
        db: Option<PgPool>,
        cache: Option<RedisCache>,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings,
            events,
            jwks_cache,
            db,
            cache,
        })
    }

    /// Pool for tables outside the event store
    pub fn db(&self) -> Result<&PgPool, ApiError> {
        self.db
            .as_ref()
            .ok_or_else(|| ApiError::not_found("Notifications are not stored by this deployment"))
    }
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.settings);

    // Spans at DEBUG keep INFO output to domain events
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let (set_request_id, propagate_request_id) = request_id_layer();

    Router::new()
        .merge(routes::api_router())
        // Middleware stack (applied bottom-up)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let max_age = if settings.env.is_dev() {
        std::time::Duration::from_secs(86400)
    } else {
        std::time::Duration::from_secs(3600)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::HeaderName::from_static(X_REQUEST_ID),
        ]))
        .allow_credentials(true)
        .max_age(max_age)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, StoreBackend};
    use crate::lifecycle::{DayBoundary, TemplateCatalog};
    use crate::services::{LogNotificationSink, Notifier};
    use crate::store::MemoryEventStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn settings() -> Settings {
        Settings {
            env: Environment::Dev,
            server_addr: "127.0.0.1:0".to_string(),
            event_store: StoreBackend::Memory,
            database_url: None,
            database_max_connections: 1,
            redis_url: None,
            redis_cache_ttl_seconds: 300,
            cors_allow_origins: vec!["http://localhost:3000".to_string()],
            supabase_jwt_jwks_url: "http://127.0.0.1:9/jwks".to_string(),
            supabase_jwt_issuer: "test".to_string(),
            supabase_jwt_audience: "authenticated".to_string(),
            jwks_cache_ttl_seconds: 60,
            day_boundary: DayBoundary::utc(),
            overdue_refresh_seconds: 60,
            template_catalog_path: None,
        }
    }

    fn app() -> Router {
        let settings = settings();
        let events = EventService::new(
            Arc::new(MemoryEventStore::new()),
            Arc::new(TemplateCatalog::builtin()),
            Notifier::new(Arc::new(LogNotificationSink)),
        );
        let jwks = JwksCache::new(
            settings.supabase_jwt_jwks_url.clone(),
            settings.supabase_jwt_issuer.clone(),
            settings.supabase_jwt_audience.clone(),
            settings.jwks_cache_ttl_seconds,
        )
        .unwrap();
        create_app(AppState::new(settings, events, jwks, None, None))
    }

    #[tokio::test]
    async fn health_is_public_and_tags_request_id() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn event_routes_require_a_token() {
        let response = app()
            .oneshot(Request::get("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn templates_require_a_bearer_scheme() {
        let response = app()
            .oneshot(
                Request::get("/templates")
                    .header("authorization", "Basic abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
