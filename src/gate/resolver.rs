//! Identity resolver: token -> identity via the external key-value store.
//!
//! The store is reached through the [`IdentityStore`] capability so the
//! decision logic can run against [`MemoryIdentityStore`] in tests.
//! Store failures are values ([`Resolution::Unavailable`]), never panics or
//! propagated errors: the caller decides (fail-closed).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::gate::token::{Identity, Token};
use crate::services::cache::{CacheClient, CacheError};

/// Result of one lookup.
#[derive(Debug)]
pub enum Resolution {
    Found(Identity),
    NotFound,
    Unavailable(StoreFailure),
}

#[derive(Debug, Error)]
pub enum StoreFailure {
    #[error("store lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Backend(#[from] CacheError),
}

#[async_trait]
pub trait IdentityStore: Send + Sync + 'static {
    // Returns the store backend name (for logging).
    fn backend_name(&self) -> &'static str;

    async fn lookup(&self, token: &Token) -> Resolution;
}

/// Resolves tokens with a `GET <token>` against a [`CacheClient`].
///
/// Every lookup, including the initial connect, is bounded by `timeout`.
/// Dropping the lookup future (client went away) cancels the store call.
#[derive(Debug)]
pub struct CacheIdentityStore<C: CacheClient> {
    cache: Arc<C>,
    timeout: Duration,
}

impl<C: CacheClient> CacheIdentityStore<C> {
    pub fn new(cache: Arc<C>, timeout: Duration) -> Self {
        Self { cache, timeout }
    }
}

#[async_trait]
impl<C: CacheClient> IdentityStore for CacheIdentityStore<C> {
    fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    async fn lookup(&self, token: &Token) -> Resolution {
        match tokio::time::timeout(self.timeout, self.cache.get_bytes(token.as_bytes())).await {
            Err(_) => Resolution::Unavailable(StoreFailure::Timeout(self.timeout)),
            Ok(Err(err)) => Resolution::Unavailable(StoreFailure::Backend(err)),
            Ok(Ok(None)) => Resolution::NotFound,
            Ok(Ok(Some(value))) => Resolution::Found(Identity::new(value)),
        }
    }
}

/// In-process token -> identity map.
///
/// Used by tests and for running the server without a store. Can be flipped
/// into an "unreachable" mode to exercise the fail-closed path.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    unavailable: AtomicBool,
    lookups: AtomicUsize,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, token: impl Into<Vec<u8>>, identity: impl Into<Vec<u8>>) -> Self {
        self.insert(token, identity);
        self
    }

    pub fn insert(&self, token: impl Into<Vec<u8>>, identity: impl Into<Vec<u8>>) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(token.into(), identity.into());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    // Number of lookups served so far, including failed ones.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn lookup(&self, token: &Token) -> Resolution {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Resolution::Unavailable(StoreFailure::Backend(CacheError::BackendConnection(
                "memory store marked unavailable".to_string(),
            )));
        }

        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match entries.get(token.as_bytes()) {
            Some(identity) => Resolution::Found(Identity::new(identity.clone())),
            None => Resolution::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::CacheResult;

    /// Cache that never answers within any reasonable timeout.
    struct StalledCache;

    #[async_trait]
    impl CacheClient for StalledCache {
        fn backend_name(&self) -> &'static str {
            "stalled"
        }

        async fn get_bytes(&self, _key: &[u8]) -> CacheResult<Option<Vec<u8>>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
    }

    /// Cache backed by a fixed map, failing on one poisoned key.
    struct MapCache(HashMap<Vec<u8>, Vec<u8>>);

    #[async_trait]
    impl CacheClient for MapCache {
        fn backend_name(&self) -> &'static str {
            "map"
        }

        async fn get_bytes(&self, key: &[u8]) -> CacheResult<Option<Vec<u8>>> {
            if key == b"boom" {
                return Err(CacheError::BackendCommand("connection reset".to_string()));
            }
            Ok(self.0.get(key).cloned())
        }
    }

    fn map_store() -> CacheIdentityStore<MapCache> {
        let mut map = HashMap::new();
        map.insert(b"abc123".to_vec(), b"user-42".to_vec());
        CacheIdentityStore::new(Arc::new(MapCache(map)), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn cache_store_maps_present_and_absent_keys() {
        let store = map_store();

        match store.lookup(&Token::new("abc123")).await {
            Resolution::Found(identity) => assert_eq!(identity, Identity::new("user-42")),
            other => panic!("expected Found, got {other:?}"),
        }
        assert!(matches!(
            store.lookup(&Token::new("missing")).await,
            Resolution::NotFound
        ));
        assert_eq!(store.backend_name(), "map");
    }

    #[tokio::test]
    async fn cache_store_reports_backend_errors_as_unavailable() {
        let store = map_store();

        assert!(matches!(
            store.lookup(&Token::new("boom")).await,
            Resolution::Unavailable(StoreFailure::Backend(CacheError::BackendCommand(_)))
        ));
    }

    #[tokio::test]
    async fn slow_store_is_cut_off_by_timeout() {
        let store = CacheIdentityStore::new(Arc::new(StalledCache), Duration::from_millis(50));

        assert!(matches!(
            store.lookup(&Token::new("abc123")).await,
            Resolution::Unavailable(StoreFailure::Timeout(d)) if d == Duration::from_millis(50)
        ));
    }

    #[tokio::test]
    async fn repeated_lookups_are_idempotent() {
        let store = MemoryIdentityStore::new().with_entry("abc123", "user-42");

        let first = store.lookup(&Token::new("abc123")).await;
        let second = store.lookup(&Token::new("abc123")).await;

        match (first, second) {
            (Resolution::Found(a), Resolution::Found(b)) => assert_eq!(a, b),
            other => panic!("expected two hits, got {other:?}"),
        }
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn memory_store_can_simulate_outage() {
        let store = MemoryIdentityStore::new().with_entry("abc123", "user-42");
        store.set_unavailable(true);

        assert!(matches!(
            store.lookup(&Token::new("abc123")).await,
            Resolution::Unavailable(_)
        ));
    }
}
