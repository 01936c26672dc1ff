use anyhow::{bail, Context, Result};
use std::env;

use crate::lifecycle::DayBoundary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// Which event store backs the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "supabase" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => bail!("Unknown EVENT_STORE '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Event store
    pub event_store: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Redis (optional read-through cache)
    pub redis_url: Option<String>,
    pub redis_cache_ttl_seconds: u64,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Supabase Auth
    pub supabase_jwt_jwks_url: String,
    pub supabase_jwt_issuer: String,
    pub supabase_jwt_audience: String,
    pub jwks_cache_ttl_seconds: u64,

    // Lifecycle
    pub day_boundary: DayBoundary,
    pub overdue_refresh_seconds: u64,
    pub template_catalog_path: Option<String>,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // Event store
        let event_store =
            StoreBackend::from_str(&env::var("EVENT_STORE").unwrap_or_else(|_| "postgres".to_string()))?;
        let database_url = optional("DATABASE_URL");
        if event_store == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when EVENT_STORE=postgres");
        }
        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10);

        // Redis
        let redis_url = optional("REDIS_URL");
        let redis_cache_ttl_seconds = parse_or("REDIS_CACHE_TTL_SECONDS", 300); // 5 minutes default

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Supabase Auth
        let supabase_jwt_jwks_url =
            env::var("SUPABASE_JWT_JWKS_URL").context("SUPABASE_JWT_JWKS_URL must be set")?;
        let supabase_jwt_issuer =
            env::var("SUPABASE_JWT_ISSUER").context("SUPABASE_JWT_ISSUER must be set")?;
        let supabase_jwt_audience =
            env::var("SUPABASE_JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string());
        let jwks_cache_ttl_seconds = parse_or("JWKS_CACHE_TTL_SECONDS", 1800); // 30 minutes default

        // Lifecycle
        let day_boundary = match optional("DAY_BOUNDARY_UTC_OFFSET") {
            Some(raw) => DayBoundary::parse(&raw)
                .with_context(|| format!("Invalid DAY_BOUNDARY_UTC_OFFSET '{}'", raw))?,
            None => DayBoundary::utc(),
        };
        let overdue_refresh_seconds = parse_or("OVERDUE_REFRESH_SECONDS", 60u64).max(1);
        let template_catalog_path = optional("TEMPLATE_CATALOG_PATH");

        Ok(Settings {
            env,
            server_addr,
            event_store,
            database_url,
            database_max_connections,
            redis_url,
            redis_cache_ttl_seconds,
            cors_allow_origins,
            supabase_jwt_jwks_url,
            supabase_jwt_issuer,
            supabase_jwt_audience,
            jwks_cache_ttl_seconds,
            day_boundary,
            overdue_refresh_seconds,
            template_catalog_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_defaults_to_dev() {
        assert_eq!(Environment::from_str("Production"), Environment::Prod);
        assert_eq!(Environment::from_str("qa"), Environment::Dev);
    }

    #[test]
    fn store_backend_names() {
        assert_eq!(StoreBackend::from_str("Supabase").unwrap(), StoreBackend::Postgres);
        assert_eq!(StoreBackend::from_str("memory").unwrap(), StoreBackend::Memory);
        assert!(StoreBackend::from_str("sqlite").is_err());
    }
}
