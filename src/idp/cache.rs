use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use sha2::{Digest, Sha256};

use super::{Claims, IdentityError, IdentityProvider};

/// Remembers successfully verified tokens for a short while.
///
/// Tokens are indexed by their SHA-256 digest so raw credentials never sit in
/// memory longer than the request that carried them. An entry lives until the
/// token expires or the ttl runs out, whichever comes first. A zero ttl turns
/// the cache into a pass-through.
pub struct CachedIdentityProvider<I: IdentityProvider> {
    inner: I,
    ttl: Duration,
    capacity: usize,

    entries: Mutex<HashMap<[u8; 32], CacheEntry>>,
}

struct CacheEntry {
    claims: Claims,
    expires_at: u64,
}

impl<I: IdentityProvider> CachedIdentityProvider<I> {
    pub fn new(inner: I, ttl: Duration, capacity: usize) -> Self {
        Self {
            inner,
            ttl,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero() && self.capacity > 0
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    fn digest(token: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.finalize().into()
    }

    fn get(&self, key: &[u8; 32], now: u64) -> Option<Claims> {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.claims.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: [u8; 32], claims: &Claims, now: u64) {
        let expires_at = claims.expires_at.min(now + self.ttl.as_secs());
        if expires_at <= now {
            return;
        }

        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() >= self.capacity {
            entries.retain(|_, entry| entry.expires_at > now);
        }
        // Still full: drop the entry closest to expiry
        if entries.len() >= self.capacity {
            let soonest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(key, _)| *key);
            if let Some(soonest) = soonest {
                entries.remove(&soonest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                claims: claims.clone(),
                expires_at,
            },
        );
    }
}

#[async_trait]
impl<I: IdentityProvider> IdentityProvider for CachedIdentityProvider<I> {
    async fn authenticate(&self, bearer_token: &str) -> Result<Claims, IdentityError> {
        if !self.is_enabled() {
            return self.inner.authenticate(bearer_token).await;
        }

        let key = Self::digest(bearer_token);
        let now = Utc::now().timestamp().max(0) as u64;
        if let Some(claims) = self.get(&key, now) {
            debug!("Claims cache hit for '{}'", claims.username);
            return Ok(claims);
        }

        let claims = self.inner.authenticate(bearer_token).await?;
        self.put(key, &claims, now);
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::Map;

    use super::*;

    struct CountingProvider {
        calls: AtomicUsize,
        ttl: i64,
    }

    impl CountingProvider {
        fn new(ttl: i64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                ttl,
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for CountingProvider {
        async fn authenticate(&self, bearer_token: &str) -> Result<Claims, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if bearer_token == "bad" {
                return Err(IdentityError::CredentialInvalid(String::from("bad token")));
            }
            Ok(Claims {
                username: bearer_token.to_string(),
                subject: String::new(),
                expires_at: (Utc::now().timestamp() + self.ttl) as u64,
                extra: Map::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_cache() {
        let cache =
            CachedIdentityProvider::new(CountingProvider::new(60), Duration::from_secs(30), 8);
        assert!(cache.is_enabled());

        for _ in 0..3 {
            let claims = cache.authenticate("alice").await.unwrap();
            assert_eq!(claims.username, "alice");
        }
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 1);

        cache.authenticate("bob").await.unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_skips_failures() {
        let cache =
            CachedIdentityProvider::new(CountingProvider::new(60), Duration::from_secs(30), 8);
        for _ in 0..2 {
            let result = cache.authenticate("bad").await;
            assert!(matches!(result, Err(IdentityError::CredentialInvalid(_))));
        }
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_respects_token_expiry() {
        // Token already expired by the time it would be cached
        let cache =
            CachedIdentityProvider::new(CountingProvider::new(0), Duration::from_secs(30), 8);
        cache.authenticate("alice").await.unwrap();
        cache.authenticate("alice").await.unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_disabled() {
        let cache = CachedIdentityProvider::new(CountingProvider::new(60), Duration::ZERO, 8);
        assert!(!cache.is_enabled());
        cache.authenticate("alice").await.unwrap();
        cache.authenticate("alice").await.unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_capacity() {
        let cache =
            CachedIdentityProvider::new(CountingProvider::new(60), Duration::from_secs(30), 2);
        for user in ["alice", "bob", "carol"] {
            cache.authenticate(user).await.unwrap();
        }
        let size = cache.entries.lock().unwrap().len();
        assert_eq!(size, 2);
    }

    #[test]
    fn test_cache_evicts_closest_to_expiry() {
        let claims = |username: &str, expires_at: u64| Claims {
            username: username.to_string(),
            subject: String::new(),
            expires_at,
            extra: Map::new(),
        };
        let key = |token: &str| CachedIdentityProvider::<CountingProvider>::digest(token);
        let cache =
            CachedIdentityProvider::new(CountingProvider::new(60), Duration::from_secs(300), 2);
        let now = 1_000;

        // Inserted first but expires last
        cache.put(key("alice"), &claims("alice", now + 200), now);
        cache.put(key("bob"), &claims("bob", now + 50), now);
        cache.put(key("carol"), &claims("carol", now + 100), now);

        assert!(cache.get(&key("alice"), now).is_some());
        assert!(cache.get(&key("bob"), now).is_none());
        assert!(cache.get(&key("carol"), now).is_some());

        // Expired entries go before live ones
        let later = now + 150;
        cache.put(key("dave"), &claims("dave", later + 100), later);
        assert!(cache.get(&key("alice"), later).is_some());
        assert!(cache.get(&key("dave"), later).is_some());
        assert_eq!(cache.entries.lock().unwrap().len(), 2);
    }
}
