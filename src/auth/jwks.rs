//! Supabase JWKS key cache and RS256 token verification

use anyhow::{Context, Result};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Claims;

/// Minimum spacing between two JWKS downloads
const REFETCH_COOLDOWN: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

#[derive(Clone)]
struct CachedKey {
    key: DecodingKey,
    fetched_at: Instant,
}

#[derive(Default)]
struct KeyRing {
    keys: HashMap<String, CachedKey>,
    last_fetch: Option<Instant>,
}

impl KeyRing {
    fn fresh(&self, kid: &str, ttl: Duration) -> Option<DecodingKey> {
        self.keys
            .get(kid)
            .filter(|cached| cached.fetched_at.elapsed() < ttl)
            .map(|cached| cached.key.clone())
    }

    fn cooling_down(&self) -> bool {
        self.last_fetch
            .is_some_and(|last| last.elapsed() < REFETCH_COOLDOWN)
    }

    /// Store the RSA keys of a key set; other key types are skipped.
    fn absorb(&mut self, set: JwkSet) -> usize {
        let now = Instant::now();
        self.last_fetch = Some(now);
        let mut stored = 0;
        for jwk in set.keys {
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                continue;
            };
            if jwk.kty != "RSA" {
                continue;
            }
            match DecodingKey::from_rsa_components(n, e) {
                Ok(key) => {
                    self.keys.insert(
                        jwk.kid.clone(),
                        CachedKey {
                            key,
                            fetched_at: now,
                        },
                    );
                    stored += 1;
                }
                Err(err) => tracing::warn!(kid = %jwk.kid, error = %err, "Skipping unusable JWK"),
            }
        }
        stored
    }
}

/// Verifies Supabase access tokens against the project's JWKS
#[derive(Clone)]
pub struct JwksCache {
    ring: Arc<RwLock<KeyRing>>,
    http: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwksCache {
    pub fn new(jwks_url: String, issuer: String, audience: String, ttl_seconds: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            ring: Arc::new(RwLock::new(KeyRing::default())),
            http,
            jwks_url,
            issuer,
            audience,
            ttl: Duration::from_secs(ttl_seconds),
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation
    }

    /// Verify a JWT and return its claims
    pub async fn verify_token(&self, token: &str) -> Result<Claims> {
        let header = decode_header(token).context("Invalid JWT header")?;
        let kid = header.kid.context("JWT missing kid header")?;
        let key = self.key_for(&kid).await?;

        let data = decode::<Claims>(token, &key, &self.validation())
            .context("JWT validation failed")?;
        Ok(data.claims)
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey> {
        if let Some(key) = self.ring.read().fresh(kid, self.ttl) {
            return Ok(key);
        }

        self.refresh().await?;

        self.ring
            .read()
            .keys
            .get(kid)
            .map(|cached| cached.key.clone())
            .with_context(|| format!("Key {} not found in JWKS", kid))
    }

    async fn refresh(&self) -> Result<()> {
        if self.ring.read().cooling_down() {
            return Ok(());
        }

        tracing::debug!(url = %self.jwks_url, "Fetching JWKS");
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .context("Failed to fetch JWKS")?;
        if !response.status().is_success() {
            anyhow::bail!("JWKS fetch failed with status: {}", response.status());
        }
        let set: JwkSet = response.json().await.context("Failed to parse JWKS")?;

        let stored = self.ring.write().absorb(set);
        tracing::info!(keys = stored, "JWKS cache refreshed");
        Ok(())
    }

    /// Fetch keys ahead of the first request
    pub async fn warm_cache(&self) -> Result<()> {
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 512-bit modulus, only used to build a decoding key
    const N: &str = "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw";
    const E: &str = "AQAB";

    fn set(keys: serde_json::Value) -> JwkSet {
        serde_json::from_value(serde_json::json!({ "keys": keys })).unwrap()
    }

    #[test]
    fn absorbs_only_rsa_keys() {
        let mut ring = KeyRing::default();
        let stored = ring.absorb(set(serde_json::json!([
            { "kid": "rsa-1", "kty": "RSA", "alg": "RS256", "n": N, "e": E },
            { "kid": "ec-1", "kty": "EC", "crv": "P-256", "x": "abc", "y": "def" },
        ])));
        assert_eq!(stored, 1);
        assert!(ring.fresh("rsa-1", Duration::from_secs(60)).is_some());
        assert!(ring.fresh("ec-1", Duration::from_secs(60)).is_none());
        assert!(ring.cooling_down());
    }

    #[test]
    fn expired_keys_are_not_fresh() {
        let mut ring = KeyRing::default();
        ring.absorb(set(serde_json::json!([
            { "kid": "rsa-1", "kty": "RSA", "n": N, "e": E },
        ])));
        assert!(ring.fresh("rsa-1", Duration::ZERO).is_none());
    }
}
