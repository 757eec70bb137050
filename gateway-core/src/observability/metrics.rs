use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectorStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub upstream_requests: u64,
    pub upstream_failures: u64,
    pub coalesced_requests: u64,
}

/// Per-connector counters, labelled by connector name.
#[derive(Clone)]
pub struct ConnectorMetrics {
    registry: Arc<Registry>,
    cache_hits: IntCounterVec,
    cache_misses: IntCounterVec,
    upstream_requests: IntCounterVec,
    upstream_failures: IntCounterVec,
    coalesced_requests: IntCounterVec,
}

impl std::fmt::Debug for ConnectorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorMetrics").finish_non_exhaustive()
    }
}

fn counter(name: &str, help: &str) -> Result<IntCounterVec> {
    Ok(IntCounterVec::new(
        Opts::new(name, help).const_label("component", "connector"),
        &["connector"],
    )?)
}

impl ConnectorMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let cache_hits = counter("gateway_cache_hits_total", "Cached responses served")?;
        let cache_misses = counter("gateway_cache_misses_total", "Cache lookups with no entry")?;
        let upstream_requests =
            counter("gateway_upstream_requests_total", "Requests sent to remote sources")?;
        let upstream_failures =
            counter("gateway_upstream_failures_total", "Remote requests that failed")?;
        let coalesced_requests = counter(
            "gateway_coalesced_requests_total",
            "Callers served by an already in-flight request",
        )?;

        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(upstream_requests.clone()))?;
        registry.register(Box::new(upstream_failures.clone()))?;
        registry.register(Box::new(coalesced_requests.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            cache_hits,
            cache_misses,
            upstream_requests,
            upstream_failures,
            coalesced_requests,
        })
    }

    pub fn record_cache_hit(&self, connector: &str) {
        self.cache_hits.with_label_values(&[connector]).inc();
    }

    pub fn record_cache_miss(&self, connector: &str) {
        self.cache_misses.with_label_values(&[connector]).inc();
    }

    pub fn record_upstream_request(&self, connector: &str) {
        self.upstream_requests.with_label_values(&[connector]).inc();
    }

    pub fn record_upstream_failure(&self, connector: &str) {
        self.upstream_failures.with_label_values(&[connector]).inc();
    }

    pub fn record_coalesced(&self, connector: &str) {
        self.coalesced_requests.with_label_values(&[connector]).inc();
    }

    pub fn stats(&self, connector: &str) -> ConnectorStats {
        ConnectorStats {
            cache_hits: self.cache_hits.with_label_values(&[connector]).get(),
            cache_misses: self.cache_misses.with_label_values(&[connector]).get(),
            upstream_requests: self.upstream_requests.with_label_values(&[connector]).get(),
            upstream_failures: self.upstream_failures.with_label_values(&[connector]).get(),
            coalesced_requests: self.coalesced_requests.with_label_values(&[connector]).get(),
        }
    }

    /// Text exposition format.
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::error::GatewayError::Unknown(e.to_string()))
    }
}
