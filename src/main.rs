use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use leasehold_backend::{
    app, auth,
    config::{self, StoreBackend},
    db,
    lifecycle::TemplateCatalog,
    logging,
    services::{
        cache::keys, EventService, LogNotificationSink, NotificationSink, Notifier,
        PgNotificationSink, RedisCache, RefreshingClock,
    },
    store::{EventStore, MemoryEventStore, PgEventStore, StoreChange},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::Settings::from_env()?;
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        event_store = ?settings.event_store,
        day_boundary = %settings.day_boundary.offset(),
        "Starting Leasehold backend"
    );

    // Template catalog
    let catalog = match &settings.template_catalog_path {
        Some(path) => TemplateCatalog::from_json_file(path)?,
        None => TemplateCatalog::builtin(),
    };
    tracing::info!(templates = catalog.list().len(), "Template catalog loaded");

    // Event store and notification channel
    let (store, sink, pool): (Arc<dyn EventStore>, Arc<dyn NotificationSink>, _) =
        match settings.event_store {
            StoreBackend::Postgres => {
                let url = settings
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
                let pool = db::create_pool(url, settings.database_max_connections).await?;
                db::run_migrations(&pool).await?;
                (
                    Arc::new(PgEventStore::new(pool.clone())),
                    Arc::new(PgNotificationSink::new(pool.clone())),
                    Some(pool),
                )
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory event store; data is lost on restart");
                (
                    Arc::new(MemoryEventStore::new()),
                    Arc::new(LogNotificationSink),
                    None,
                )
            }
        };

    // Audit trail of committed changes, kept for the process lifetime
    store
        .subscribe(Arc::new(|change: &StoreChange| {
            let event = change.event();
            tracing::info!(
                change = change.kind(),
                event_id = %event.id,
                status = %event.status,
                "Event stored"
            );
        }))
        .detach();

    // Optional Redis cache
    let cache = match &settings.redis_url {
        Some(url) => match RedisCache::new(url, settings.redis_cache_ttl_seconds).await {
            Ok(cache) => {
                if let Err(e) = cache.delete_pattern(&keys::event_pattern()).await {
                    tracing::warn!(error = %e, "Failed to clear cached events");
                }
                Some(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable - continuing without cache");
                None
            }
        },
        None => None,
    };

    // Overdue reference time for read paths
    let (reference_clock, _refresher) =
        RefreshingClock::spawn(Duration::from_secs(settings.overdue_refresh_seconds));

    let mut events = EventService::new(store, Arc::new(catalog), Notifier::new(sink))
        .with_reference_clock(Arc::new(reference_clock))
        .with_day_boundary(settings.day_boundary);
    if let Some(cache) = &cache {
        events = events.with_cache(cache.clone());
    }

    // JWKS cache for JWT verification
    let jwks_cache = auth::JwksCache::new(
        settings.supabase_jwt_jwks_url.clone(),
        settings.supabase_jwt_issuer.clone(),
        settings.supabase_jwt_audience.clone(),
        settings.jwks_cache_ttl_seconds,
    )?;
    if let Err(e) = jwks_cache.warm_cache().await {
        tracing::warn!(error = %e, "Failed to warm JWKS cache - will fetch on first request");
    }

    let state = app::AppState::new(settings.clone(), events, jwks_cache, pool, cache);
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
