//! Session Cache Gate
//! Mission: Skip re-issuing tokens on repeated logins without ever blocking a login
//!
//! The cache is a latency optimisation only. Every cache failure degrades to a
//! miss, and every hit is re-validated before it is trusted.

use crate::auth::{
    clock::Clock,
    error::CacheError,
    models::CredentialPair,
    tokens::TokenValidator,
};
use async_trait::async_trait;
use chrono::Duration;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Key-value cache collaborator
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: std::time::Duration)
        -> Result<(), CacheError>;
}

/// Process-local cache with per-entry TTL
#[derive(Default)]
pub struct InMemorySessionCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl InMemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries (call from a background task)
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries.lock().retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: std::time::Duration,
    ) -> Result<(), CacheError> {
        self.entries.lock().insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

/// Fronts the cache collaborator on the login path
pub struct SessionCacheGate {
    cache: Option<Arc<dyn SessionCache>>,
    validator: TokenValidator,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    deadline: std::time::Duration,
}

impl SessionCacheGate {
    /// `ttl` is clamped to `access_lifetime`
    pub fn new(
        cache: Option<Arc<dyn SessionCache>>,
        validator: TokenValidator,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        access_lifetime: Duration,
        deadline: std::time::Duration,
    ) -> Self {
        Self {
            cache,
            validator,
            clock,
            ttl: ttl.min(access_lifetime),
            deadline,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Live pair for `identity_key`, or `None` on miss, stale entry or cache error
    pub async fn lookup(&self, identity_key: &str) -> Option<CredentialPair> {
        let cache = self.cache.as_ref()?;

        let raw = match tokio::time::timeout(self.deadline, cache.get(identity_key)).await {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => {
                warn!(error = %e, "CacheUnavailable on lookup, issuing fresh credentials");
                return None;
            }
            Err(_) => {
                warn!("CacheUnavailable on lookup (deadline exceeded), issuing fresh credentials");
                return None;
            }
        };

        let pair: CredentialPair = match serde_json::from_str(&raw) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session cache entry");
                return None;
            }
        };

        // Do not trust cache freshness: the token itself must still verify.
        match self.validator.validate_access(&pair.access_token) {
            Ok(subject) if subject == pair.user_id && pair.expires_at > self.clock.now() => {
                debug!("Session cache hit for user {}", subject);
                Some(pair)
            }
            Ok(_) => {
                debug!("Session cache entry inconsistent, treating as miss");
                None
            }
            Err(e) => {
                debug!(reason = e.code(), "Stale session cache entry, treating as miss");
                None
            }
        }
    }

    /// Remember `pair` for `identity_key`; TTL never outlives the access token
    pub async fn store(&self, identity_key: &str, pair: &CredentialPair) -> Result<(), CacheError> {
        let Some(cache) = self.cache.as_ref() else {
            return Ok(());
        };

        let remaining = pair.expires_at - self.clock.now();
        let ttl = self.ttl.min(remaining);
        let Ok(ttl) = ttl.to_std() else {
            // already expired or negative; nothing worth caching
            return Ok(());
        };
        if ttl.is_zero() {
            return Ok(());
        }

        let value =
            serde_json::to_string(pair).map_err(|e| CacheError::Corrupt(e.to_string()))?;

        match tokio::time::timeout(self.deadline, cache.set(identity_key, value, ttl)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Unavailable("deadline exceeded".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        clock::ManualClock,
        jwt::ClaimCodec,
        models::UserId,
        tokens::{TokenIssuer, TokenLifetimes},
    };
    use chrono::{TimeZone, Utc};

    struct BrokenCache;

    #[async_trait]
    impl SessionCache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn set(
            &self,
            _key: &str,
            _value: String,
            _ttl: std::time::Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    fn setup(
        cache: Option<Arc<dyn SessionCache>>,
    ) -> (SessionCacheGate, TokenIssuer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
        ));
        let codec = Arc::new(ClaimCodec::new(
            b"test-secret-key-that-is-at-least-32-bytes",
            "tablelink_user",
            clock.clone(),
        ));
        let lifetimes = TokenLifetimes::default();
        let gate = SessionCacheGate::new(
            cache,
            TokenValidator::new(codec.clone()),
            clock.clone(),
            Duration::days(1),
            lifetimes.access,
            std::time::Duration::from_secs(1),
        );
        (gate, TokenIssuer::new(codec, lifetimes), clock)
    }

    #[tokio::test]
    async fn test_store_then_lookup_hits() {
        let (gate, issuer, _clock) = setup(Some(Arc::new(InMemorySessionCache::new())));
        let pair = issuer.issue(UserId(1)).unwrap();

        gate.store("alice@example.com", &pair).await.unwrap();
        assert_eq!(gate.lookup("alice@example.com").await, Some(pair));
        assert_eq!(gate.lookup("bob@example.com").await, None);
    }

    #[tokio::test]
    async fn test_expired_cached_token_is_a_miss() {
        let (gate, issuer, clock) = setup(Some(Arc::new(InMemorySessionCache::new())));
        let pair = issuer.issue(UserId(1)).unwrap();
        gate.store("alice@example.com", &pair).await.unwrap();

        // Entry is still in the cache (wall-clock TTL), but the token is dead
        clock.advance(Duration::hours(5));
        assert_eq!(gate.lookup("alice@example.com").await, None);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let cache = Arc::new(InMemorySessionCache::new());
        cache
            .set("alice@example.com", "not json".to_string(), std::time::Duration::from_secs(60))
            .await
            .unwrap();
        let (gate, _issuer, _clock) = setup(Some(cache));

        assert_eq!(gate.lookup("alice@example.com").await, None);
    }

    #[tokio::test]
    async fn test_broken_cache_degrades_to_miss() {
        let (gate, issuer, _clock) = setup(Some(Arc::new(BrokenCache)));
        let pair = issuer.issue(UserId(1)).unwrap();

        assert_eq!(gate.lookup("alice@example.com").await, None);
        assert!(gate.store("alice@example.com", &pair).await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_gate_always_misses() {
        let (gate, issuer, _clock) = setup(None);
        let pair = issuer.issue(UserId(1)).unwrap();

        assert!(!gate.is_enabled());
        gate.store("alice@example.com", &pair).await.unwrap();
        assert_eq!(gate.lookup("alice@example.com").await, None);
    }

    #[tokio::test]
    async fn test_in_memory_entries_expire() {
        let cache = InMemorySessionCache::new();
        cache
            .set("k", "v".to_string(), std::time::Duration::from_millis(0))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache
            .set("k2", "v2".to_string(), std::time::Duration::from_secs(60))
            .await
            .unwrap();
        cache.cleanup();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k2").await.unwrap(), Some("v2".to_string()));
    }
}
