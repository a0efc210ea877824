//! Thin message-bus client abstraction.
//!
//! The bus itself (Kafka, NATS, SQS, ...) is out of scope; this trait
//! is the seam [`super::EventPublisher`] depends on, with an
//! in-memory implementation for tests and an HTTP webhook adapter as
//! the one concrete "real" backend.

use std::sync::Arc;

use async_trait::async_trait;
use dayrunner_core::CompletionEvent;
use parking_lot::Mutex;

/// Publishes one keyed, serializable record to a named topic.
#[async_trait]
pub trait BusClient: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, event: &CompletionEvent) -> Result<(), anyhow::Error>;
}

/// Records every publish call in memory, for assertions in tests.
#[derive(Clone, Default)]
pub struct InMemoryBusClient {
    published: Arc<Mutex<Vec<(String, String, CompletionEvent)>>>,
}

impl InMemoryBusClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn published(&self) -> Vec<(String, String, CompletionEvent)> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl BusClient for InMemoryBusClient {
    async fn publish(&self, topic: &str, key: &str, event: &CompletionEvent) -> Result<(), anyhow::Error> {
        self.published
            .lock()
            .push((topic.to_string(), key.to_string(), event.clone()));
        Ok(())
    }
}

/// Publishes each event as a JSON POST to a configured webhook URL,
/// standing in for a real producer client. The topic and key are sent
/// as headers (`X-Topic`, `X-Key`) so a receiving gateway can route
/// without parsing the body.
pub struct HttpBusClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBusClient {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl BusClient for HttpBusClient {
    async fn publish(&self, topic: &str, key: &str, event: &CompletionEvent) -> Result<(), anyhow::Error> {
        self.client
            .post(&self.endpoint)
            .header("X-Topic", topic)
            .header("X-Key", key)
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
