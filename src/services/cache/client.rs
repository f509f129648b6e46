//! Cache client interface used by the identity resolver.
use async_trait::async_trait;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command).
///
/// Note:
/// - We keep this independent from `AppError` so callers can decide how to fail
///   (the access gate fails closed: any error becomes a redirect).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
}

/// A minimal, read-only cache interface.
///
/// The gate only needs a point lookup (`GET <key>`), keys and values are raw bytes.
///
/// Implementations must be cheap to share (typically `Arc<...>` inside).
#[async_trait]
pub trait CacheClient: Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Value stored under `key`, `Ok(None)` when the key does not exist.
    async fn get_bytes(&self, key: &[u8]) -> CacheResult<Option<Vec<u8>>>;
}
