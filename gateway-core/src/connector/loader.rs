/// Request coalescing: concurrent loads of the same URI share one dispatch.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::ConnectorError;
use crate::record::ErrorRecord;

type LoadResult = Result<Value, ConnectorError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

#[derive(Debug)]
pub struct Loaded {
    pub result: LoadResult,
    /// True when this caller joined a load another caller started.
    pub coalesced: bool,
}

#[derive(Clone)]
pub struct Coalescer {
    enabled: bool,
    inflight: Arc<Mutex<HashMap<String, (u64, SharedLoad)>>>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for Coalescer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coalescer")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl Coalescer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    #[cfg(test)]
    async fn in_flight(&self) -> usize {
        self.inflight.lock().await.len()
    }

    /// Runs `start()` for `key` unless a load for the same key is still in
    /// flight, in which case that load's result is shared. Work is spawned,
    /// so it completes even if every caller goes away.
    pub async fn load<F>(&self, key: String, start: F) -> Loaded
    where
        F: FnOnce() -> BoxFuture<'static, LoadResult>,
    {
        if !self.enabled {
            return Loaded {
                result: run_detached(start()).await,
                coalesced: false,
            };
        }

        let (shared, coalesced) = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(&key) {
                Some((_, shared)) => (shared.clone(), true),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let work = start();
                    let registry = Arc::clone(&self.inflight);
                    let cleanup_key = key.clone();
                    let shared = run_detached(async move {
                        let result = work.await;
                        let mut inflight = registry.lock().await;
                        if inflight.get(&cleanup_key).map(|(owner, _)| *owner) == Some(id) {
                            inflight.remove(&cleanup_key);
                        }
                        result
                    })
                    .boxed()
                    .shared();
                    inflight.insert(key, (id, shared.clone()));
                    (shared, false)
                }
            }
        };

        Loaded {
            result: shared.await,
            coalesced,
        }
    }
}

/// Spawns `work` and awaits it. Dropping the returned future does not
/// cancel the task.
pub(crate) fn run_detached<F>(work: F) -> impl std::future::Future<Output = LoadResult> + Send + 'static
where
    F: std::future::Future<Output = LoadResult> + Send + 'static,
{
    let handle = tokio::spawn(work);
    async move {
        match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(ErrorRecord::builder()
                .description(format!("Request task did not complete: {}", join_error))
                .wrap(&join_error)
                .into()),
        }
    }
}
