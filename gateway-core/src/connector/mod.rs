/// Remote data access for models.
///
/// [`HttpConnector`] does the work: caching of GET responses keyed by URI and
/// identity, coalescing of concurrent identical GETs, and translation of
/// transport failures into [`ErrorRecord`](crate::record::ErrorRecord)s.
/// Concrete connectors wrap one and implement [`Connector`].

pub mod http;
pub mod loader;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod transport;

pub use http::{cache_key, HttpConnector, HttpConnectorBuilder, RequestOverrides, QUERY_ERROR_CODE};
pub use loader::Coalescer;
pub use transport::{OutboundRequest, ReqwestTransport, Transport, TransportError, TransportResponse};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ConnectorError;

#[async_trait]
pub trait Connector: Send + Sync {
    fn http(&self) -> &HttpConnector;

    fn name(&self) -> &str {
        self.http().name()
    }

    async fn get(&self, endpoint: &str) -> Result<Value, ConnectorError> {
        self.http().get(endpoint).await
    }

    async fn post(
        &self,
        endpoint: &str,
        body: Value,
        overrides: RequestOverrides,
    ) -> Result<Value, ConnectorError> {
        self.http().post(endpoint, body, overrides).await
    }

    async fn put(
        &self,
        endpoint: &str,
        body: Value,
        overrides: RequestOverrides,
    ) -> Result<Value, ConnectorError> {
        self.http().put(endpoint, body, overrides).await
    }

    async fn load(&self, uris: &[String]) -> Result<Vec<Value>, ConnectorError> {
        self.http().load(uris).await
    }
}

impl Connector for HttpConnector {
    fn http(&self) -> &HttpConnector {
        self
    }
}
