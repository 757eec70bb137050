/// A scripted in-memory transport for exercising connectors without a network.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::transport::{OutboundRequest, Transport, TransportError, TransportResponse};

#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(TransportResponse),
    Fail(TransportError),
}

/// Replies are queued per URI. The last queued reply for a URI repeats.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<OutboundRequest>>,
    delay: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every reply waits this long first, which keeps requests in flight
    /// long enough to overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(&self, uri: &str, status: u16, body: Value) {
        self.push(uri, Scripted::Respond(TransportResponse::new(status, body)));
    }

    pub fn fail(&self, uri: &str, message: &str) {
        self.push(uri, Scripted::Fail(TransportError::new(message)));
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        lock(&self.requests).clone()
    }

    pub fn calls_to(&self, uri: &str) -> usize {
        lock(&self.requests).iter().filter(|r| r.uri == uri).count()
    }

    fn push(&self, uri: &str, reply: Scripted) {
        lock(&self.routes)
            .entry(uri.to_string())
            .or_default()
            .push_back(reply);
    }

    fn next_reply(&self, uri: &str) -> Option<Scripted> {
        let mut routes = lock(&self.routes);
        let queue = routes.get_mut(uri)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let uri = request.uri.clone();
        lock(&self.requests).push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_reply(&uri) {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(error)) => Err(error),
            None => Err(TransportError::new(format!("no scripted reply for {}", uri))),
        }
    }
}
