use futures::future::{try_join_all, FutureExt};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::loader::{run_detached, Coalescer};
use super::transport::{OutboundRequest, ReqwestTransport, Transport, TransportError};
use crate::error::{CacheError, ConnectorError, GatewayError, Result};
use crate::observability::{noop_logger, ConnectorMetrics, Logger};
use crate::record::ErrorRecord;
use crate::storage::{CacheBackend, CacheSettings};

pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const QUERY_ERROR_CODE: &str = "GRAPHQL_QUERY_ERROR";

/// Stable cache key for a URI fetched with a given identity.
pub fn cache_key(uri: &str, authorization: Option<&str>) -> String {
    let to_hash = format!("{}-{}", uri, authorization.unwrap_or_default());
    format!("{:x}", md5::compute(to_hash))
}

/// Options a caller may override on a single `post`/`put`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOverrides {
    pub headers: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub body: Option<Value>,
}

impl RequestOverrides {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug)]
struct Inner {
    name: String,
    api_base_uri: String,
    headers: BTreeMap<String, String>,
    cache_enabled: bool,
    cache_ttl: Duration,
    cache: Option<Arc<dyn CacheBackend>>,
    transport: Arc<dyn Transport>,
    logger: Arc<dyn Logger>,
    metrics: Option<ConnectorMetrics>,
    docs_link: Option<String>,
}

/// Remote data client with per-URI caching, request coalescing and uniform
/// error wrapping. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    inner: Arc<Inner>,
    loader: Coalescer,
}

impl HttpConnector {
    pub fn builder(name: impl Into<String>, api_base_uri: impl Into<String>) -> HttpConnectorBuilder {
        HttpConnectorBuilder::new(name.into(), api_base_uri.into())
    }

    /// Builder named after `T`, so errors report the concrete connector type.
    pub fn builder_for<T: ?Sized>(api_base_uri: impl Into<String>) -> HttpConnectorBuilder {
        let full = std::any::type_name::<T>();
        let name = full.rsplit("::").next().unwrap_or(full);
        Self::builder(name, api_base_uri)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn api_base_uri(&self) -> &str {
        &self.inner.api_base_uri
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.inner.headers
    }

    pub fn cache_enabled(&self) -> bool {
        self.inner.cache_enabled
    }

    pub fn cache_ttl(&self) -> Duration {
        self.inner.cache_ttl
    }

    pub fn metrics(&self) -> Option<&ConnectorMetrics> {
        self.inner.metrics.as_ref()
    }

    pub fn uri_for(&self, endpoint: &str) -> String {
        format!("{}{}", self.inner.api_base_uri, endpoint)
    }

    /// GET through the coalescing loader; cached when caching is enabled.
    pub async fn get(&self, endpoint: &str) -> std::result::Result<Value, ConnectorError> {
        let uri = self.uri_for(endpoint);
        let inner = Arc::clone(&self.inner);
        let request_uri = uri.clone();

        let loaded = self
            .loader
            .load(uri, move || inner.request_data(request_uri).boxed())
            .await;

        if loaded.coalesced {
            if let Some(metrics) = &self.inner.metrics {
                metrics.record_coalesced(&self.inner.name);
            }
        }
        loaded.result
    }

    /// Fetches every URI; results keep input order and the first failure
    /// fails the whole batch. Each fetch runs on its own task, so dropping
    /// the returned future leaves them running.
    pub async fn load(&self, uris: &[String]) -> std::result::Result<Vec<Value>, ConnectorError> {
        let pending: Vec<_> = uris
            .iter()
            .map(|uri| run_detached(Arc::clone(&self.inner).request_data(uri.clone())))
            .collect();
        try_join_all(pending).await
    }

    pub async fn post(
        &self,
        endpoint: &str,
        body: Value,
        overrides: RequestOverrides,
    ) -> std::result::Result<Value, ConnectorError> {
        self.mutation(Method::POST, endpoint, body, overrides).await
    }

    pub async fn put(
        &self,
        endpoint: &str,
        body: Value,
        overrides: RequestOverrides,
    ) -> std::result::Result<Value, ConnectorError> {
        self.mutation(Method::PUT, endpoint, body, overrides).await
    }

    /// Non-cacheable request. Always goes to the network.
    async fn mutation(
        &self,
        method: Method,
        endpoint: &str,
        body: Value,
        overrides: RequestOverrides,
    ) -> std::result::Result<Value, ConnectorError> {
        let uri = self.uri_for(endpoint);
        let mut request = self.inner.request_config(method, &uri);
        request.headers.extend(overrides.headers);
        request.body = Some(overrides.body.unwrap_or(body));
        if overrides.timeout.is_some() {
            request.timeout = overrides.timeout;
        }

        self.inner.record(|m, name| m.record_upstream_request(name));
        match self.inner.transport.send(request).await {
            Ok(response) => Ok(response.body),
            Err(err) => {
                self.inner.record(|m, name| m.record_upstream_failure(name));
                Err(self.inner.wrap_failure(&err, &uri).into())
            }
        }
    }
}

impl Inner {
    fn record(&self, f: impl FnOnce(&ConnectorMetrics, &str)) {
        if let Some(metrics) = &self.metrics {
            f(metrics, &self.name);
        }
    }

    fn authorization(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.as_str())
    }

    fn request_config(&self, method: Method, uri: &str) -> OutboundRequest {
        let mut headers = self.headers.clone();
        headers
            .entry("Accept".to_string())
            .or_insert_with(|| "application/json".to_string());

        OutboundRequest {
            method,
            uri: uri.to_string(),
            headers,
            body: None,
            timeout: None,
        }
    }

    async fn request_data(self: Arc<Self>, uri: String) -> std::result::Result<Value, ConnectorError> {
        self.logger.info(&format!("Request made to {}", uri));
        let key = cache_key(&uri, self.authorization());

        let cached = if self.cache_enabled {
            self.get_cached(&key).await?
        } else {
            None
        };

        match cached {
            Some(value) => {
                // Serve the cached copy and refresh it in the background.
                let refresher = Arc::clone(&self);
                tokio::spawn(async move {
                    if let Err(err) = refresher.fetch(&uri, &key).await {
                        refresher
                            .logger
                            .warn(&format!("Background refresh of {} failed: {}", uri, err));
                    }
                });
                Ok(value)
            }
            None => self.fetch(&uri, &key).await,
        }
    }

    async fn get_cached(&self, key: &str) -> std::result::Result<Option<Value>, CacheError> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };

        match cache.get(key).await? {
            Some(raw) => {
                self.logger.info("loading data from cache");
                self.record(|m, name| m.record_cache_hit(name));
                let value = serde_json::from_str(&raw).map_err(|e| CacheError::Decode(e.to_string()))?;
                Ok(Some(value))
            }
            None => {
                self.record(|m, name| m.record_cache_miss(name));
                Ok(None)
            }
        }
    }

    async fn fetch(self: &Arc<Self>, uri: &str, key: &str) -> std::result::Result<Value, ConnectorError> {
        let request = self.request_config(Method::GET, uri);

        self.record(|m, name| m.record_upstream_request(name));
        match self.transport.send(request).await {
            Ok(response) => {
                if response.status == 200 && self.cache_enabled && self.cache.is_some() {
                    // The caller never waits on the write.
                    let writer = Arc::clone(self);
                    let key = key.to_string();
                    let body = response.body.clone();
                    tokio::spawn(async move { writer.add_to_cache(&key, &body).await });
                }
                Ok(response.body)
            }
            Err(err) => {
                self.record(|m, name| m.record_upstream_failure(name));
                Err(self.wrap_failure(&err, uri).into())
            }
        }
    }

    /// Best effort; a failed write is logged and never reaches the caller.
    async fn add_to_cache(&self, key: &str, value: &Value) {
        if !self.cache_enabled {
            return;
        }
        let Some(cache) = &self.cache else {
            return;
        };

        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                self.logger.warn(&format!("Could not serialize response for cache: {}", err));
                return;
            }
        };

        self.logger.info(&format!(
            "caching response data for {} seconds",
            self.cache_ttl.as_secs()
        ));
        if let Err(err) = cache.set_ex(key, self.cache_ttl, payload).await {
            self.logger.warn(&format!("Cache write failed: {}", err));
        }
    }

    fn wrap_failure(&self, err: &TransportError, uri: &str) -> ErrorRecord {
        let mut builder = ErrorRecord::builder()
            .description(format!("There was an error with the query: {}", err.message))
            .error_code(QUERY_ERROR_CODE)
            .graphql_model(self.name.clone())
            .target_endpoint(uri);
        if let Some(docs_link) = &self.docs_link {
            builder = builder.docs_link(docs_link.clone());
        }
        builder.wrap(err)
    }
}

#[derive(Debug)]
pub struct HttpConnectorBuilder {
    name: String,
    api_base_uri: String,
    headers: BTreeMap<String, String>,
    cache_enabled: bool,
    cache_ttl: Duration,
    cache: Option<Arc<dyn CacheBackend>>,
    transport: Option<Arc<dyn Transport>>,
    logger: Arc<dyn Logger>,
    metrics: Option<ConnectorMetrics>,
    docs_link: Option<String>,
    coalesce: bool,
}

impl HttpConnectorBuilder {
    fn new(name: String, api_base_uri: String) -> Self {
        Self {
            name,
            api_base_uri,
            headers: BTreeMap::new(),
            cache_enabled: true,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache: None,
            transport: None,
            logger: noop_logger(),
            metrics: None,
            docs_link: None,
            coalesce: true,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn cache(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(backend);
        self
    }

    pub fn cache_backend(mut self, backend: Option<Arc<dyn CacheBackend>>) -> Self {
        self.cache = backend;
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Shared backend and TTL from configuration. No backend means no caching.
    pub fn cache_settings(self, settings: &CacheSettings) -> Self {
        self.cache_backend(settings.backend.clone())
            .cache_enabled(settings.backend.is_some())
            .cache_ttl(settings.ttl)
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn metrics(mut self, metrics: ConnectorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn docs_link(mut self, docs_link: impl Into<String>) -> Self {
        self.docs_link = Some(docs_link.into());
        self
    }

    pub fn coalesce(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    pub fn build(mut self) -> Result<HttpConnector> {
        let transport: Arc<dyn Transport> = match self.transport.take() {
            Some(transport) => transport,
            None => Arc::new(
                ReqwestTransport::new()
                    .map_err(|e| GatewayError::InvalidConfig(format!("HTTP client: {}", e)))?,
            ),
        };
        Ok(self.build_with(transport))
    }

    /// Builds over `transport`, ignoring any transport set earlier.
    pub fn build_with(self, transport: Arc<dyn Transport>) -> HttpConnector {
        HttpConnector {
            inner: Arc::new(Inner {
                name: self.name,
                api_base_uri: self.api_base_uri,
                headers: self.headers,
                cache_enabled: self.cache_enabled,
                cache_ttl: self.cache_ttl,
                cache: self.cache,
                transport,
                logger: self.logger,
                metrics: self.metrics,
                docs_link: self.docs_link,
            }),
            loader: Coalescer::new(self.coalesce),
        }
    }
}
