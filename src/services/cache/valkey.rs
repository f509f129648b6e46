use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

/// Valkey/Redis-backed cache client.
///
/// The connection manager is created on first use, so the server can start
/// while the store is still down; a failed connect is retried on the next lookup.
/// Once connected, the manager is shared by all requests and reconnects on its own.
#[derive(Debug)]
pub struct ValkeyClient {
    client: redis::Client,
    manager: OnceCell<ConnectionManager>,
}

impl ValkeyClient {
    // Create a Valkey client from a URL like `redis://localhost:6379`
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        Ok(Self {
            client,
            manager: OnceCell::new(),
        })
    }

    async fn connection(&self) -> CacheResult<ConnectionManager> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                tracing::debug!("connecting to valkey");
                self.client
                    .get_connection_manager()
                    .await
                    .map_err(|e| CacheError::BackendConnection(e.to_string()))
            })
            .await?;

        Ok(manager.clone())
    }
}

#[async_trait]
impl CacheClient for ValkeyClient {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn get_bytes(&self, key: &[u8]) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;

        // GET returns a bulk string or Nil.
        let resp: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(resp)
    }
}
