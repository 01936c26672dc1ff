//! Redis read-through cache for event rows.
//!
//! Values are serde JSON with a default TTL. Every write to an event
//! deletes its key. Only reads go through the cache; mutations load from
//! the store.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Redis cache client with connection pooling.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    default_ttl: Duration,
}

impl RedisCache {
    /// Create a new Redis cache connection.
    pub async fn new(redis_url: &str, default_ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        tracing::info!("Redis cache connected");

        Ok(Self {
            conn,
            default_ttl: Duration::from_secs(default_ttl_seconds),
        })
    }

    /// Get a value from cache.
    #[instrument(skip(self), fields(cache_hit))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(data)) => {
                match serde_json::from_str(&data) {
                    Ok(value) => {
                        debug!(key = key, "Cache hit");
                        tracing::Span::current().record("cache_hit", true);
                        Some(value)
                    }
                    Err(e) => {
                        warn!(key = key, error = %e, "Failed to deserialize cached value");
                        tracing::Span::current().record("cache_hit", false);
                        None
                    }
                }
            }
            Ok(None) => {
                debug!(key = key, "Cache miss");
                tracing::Span::current().record("cache_hit", false);
                None
            }
            Err(e) => {
                error!(key = key, error = %e, "Redis get error");
                tracing::Span::current().record("cache_hit", false);
                None
            }
        }
    }

    /// Set a value in cache with default TTL.
    #[instrument(skip(self, value))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    /// Set a value in cache with custom TTL.
    #[instrument(skip(self, value))]
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.conn.clone();

        let data = serde_json::to_string(value)
            .context("Failed to serialize value for cache")?;

        conn.set_ex::<_, _, ()>(key, data, ttl.as_secs())
            .await
            .context("Failed to set cache value")?;

        debug!(key = key, ttl_secs = ttl.as_secs(), "Cached value");
        Ok(())
    }

    /// Delete a specific key from cache.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();

        let deleted: i32 = conn.del(key).await.context("Failed to delete cache key")?;

        debug!(key = key, deleted = deleted > 0, "Cache delete");
        Ok(deleted > 0)
    }

    /// Delete all keys matching a pattern (e.g., "event:*").
    #[instrument(skip(self))]
    pub async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let mut conn = self.conn.clone();

        // SCAN pages until the cursor wraps back to 0 (production-safe)
        let keys = scan_all(|cursor| {
            let mut conn = self.conn.clone();
            async move {
                let page: (u64, Vec<String>) = redis::cmd("SCAN")
                    .cursor_arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(1000)
                    .query_async(&mut conn)
                    .await
                    .context("Failed to scan cache keys")?;
                Ok(page)
            }
        })
        .await?;

        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: i32 = conn.del(&keys).await.context("Failed to delete cache keys")?;

        debug!(pattern = pattern, deleted = deleted, "Cache pattern delete");
        Ok(deleted as usize)
    }

    /// Check if Redis is healthy.
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis health check failed")?;
        Ok(())
    }
}

/// Collect every key from a cursor-based scan, starting at cursor 0
async fn scan_all<F, Fut>(mut page: F) -> Result<Vec<String>>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<(u64, Vec<String>)>>,
{
    let mut keys = Vec::new();
    let mut cursor = 0;
    loop {
        let (next, batch) = page(cursor).await?;
        keys.extend(batch);
        if next == 0 {
            return Ok(keys);
        }
        cursor = next;
    }
}

/// Cache key builders for consistent key formats.
pub mod keys {
    use uuid::Uuid;

    /// Single event row
    pub fn event(event_id: Uuid) -> String {
        format!("event:{}", event_id)
    }

    /// Pattern covering every cached event
    pub fn event_pattern() -> String {
        "event:*".to_string()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scan_follows_the_cursor_to_the_end() {
        let pages = vec![
            (17, vec!["event:a".to_string()]),
            (42, Vec::new()),
            (0, vec!["event:b".to_string(), "event:c".to_string()]),
        ];
        let mut seen = Vec::new();
        let keys = scan_all(|cursor| {
            seen.push(cursor);
            let page = pages[seen.len() - 1].clone();
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(keys, vec!["event:a", "event:b", "event:c"]);
        assert_eq!(seen, vec![0, 17, 42]);
    }

    #[tokio::test]
    async fn scan_errors_propagate() {
        let err = scan_all(|_| async { Err(anyhow::anyhow!("connection reset")) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
