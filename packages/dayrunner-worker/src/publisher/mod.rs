//! At-least-once completion event publication (§4.6).

pub mod bus;

use async_trait::async_trait;
use dayrunner_core::{ClockSource, CompletionEvent, FileId, WorkerId};
use thiserror::Error;

pub use bus::BusClient;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event bus error: {0}")]
    Bus(#[source] anyhow::Error),
}

/// Publishes a `{workerId, fileId, eventType, completedAt, totalRows,
/// correlationId}` record keyed by `"{workerId}:{fileId}"` to a named
/// topic. Failure propagates to the orchestrator (§7); the bus
/// contract itself is at-least-once, so downstream consumers
/// deduplicate on `correlationId`.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_completed(
        &self,
        worker_id: &WorkerId,
        file_id: &FileId,
        event_type: &str,
        total_rows: u64,
    ) -> Result<(), PublishError>;
}

/// Default [`EventPublisher`]: builds a [`CompletionEvent`] and hands
/// it to a [`BusClient`].
pub struct DefaultEventPublisher<B> {
    bus: B,
    topic: String,
    clock: std::sync::Arc<dyn ClockSource>,
}

impl<B: BusClient> DefaultEventPublisher<B> {
    #[must_use]
    pub fn new(bus: B, topic: impl Into<String>, clock: std::sync::Arc<dyn ClockSource>) -> Self {
        Self {
            bus,
            topic: topic.into(),
            clock,
        }
    }
}

#[async_trait]
impl<B: BusClient> EventPublisher for DefaultEventPublisher<B> {
    async fn publish_completed(
        &self,
        worker_id: &WorkerId,
        file_id: &FileId,
        event_type: &str,
        total_rows: u64,
    ) -> Result<(), PublishError> {
        let completed_at = self.clock.now();
        let event = CompletionEvent::new(
            worker_id.clone(),
            file_id.clone(),
            event_type.to_string(),
            completed_at,
            total_rows,
            completed_at.timestamp_millis(),
        );
        let key = event.bus_key();
        self.bus
            .publish(&self.topic, &key, &event)
            .await
            .map_err(PublishError::Bus)
    }
}
