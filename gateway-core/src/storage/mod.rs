pub mod db;
pub mod kv;

pub use db::SqliteStore;
pub use kv::{CacheBackend, MemoryStore};

use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheBackendKind, CacheConfig};
use crate::connector::http::DEFAULT_CACHE_TTL_SECS;
use crate::error::{GatewayError, Result};

/// Opens the backend named by the cache configuration. Returns `None` when
/// caching is switched off.
pub async fn open_backend(config: &CacheConfig) -> Result<Option<Arc<dyn CacheBackend>>> {
    if !config.enabled {
        return Ok(None);
    }

    let backend: Arc<dyn CacheBackend> = match config.backend {
        CacheBackendKind::Memory => Arc::new(MemoryStore::new()),
        CacheBackendKind::Sqlite => {
            let path = config.sqlite_path.clone().ok_or_else(|| {
                GatewayError::InvalidConfig("cache.sqlite_path is not set".to_string())
            })?;
            Arc::new(SqliteStore::new(path).await?)
        }
    };
    Ok(Some(backend))
}

/// The configured cache as connectors consume it: one backend shared by
/// every connector, and the entry lifetime.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: Option<Arc<dyn CacheBackend>>,
    pub ttl: Duration,
}

impl CacheSettings {
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            backend: open_backend(config).await?,
            ttl: Duration::from_secs(config.ttl_seconds),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: None,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}
