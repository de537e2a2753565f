//! The publish side of the outbox: anything that can accept a claimed
//! message is a [`Publisher`]. Production deployments would swap in a
//! message-broker client; `orbita-runtime` ships only a [`LoggingPublisher`]
//! and a [`NoopPublisher`] for tests.

use async_trait::async_trait;
use orbita_kernel::domain::outbox::OutboxMessage;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, message: &OutboxMessage) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
#[error("publish failed: {0}")]
pub struct PublishError(pub String);

/// Discards every message; publishing never fails. Useful for tests
/// that only care about outbox state transitions.
pub struct NoopPublisher;

#[async_trait]
impl Publisher for NoopPublisher {
    async fn publish(&self, _message: &OutboxMessage) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Logs each claimed message at its routing key — the seam a real
/// deployment would replace with a message-broker client. Kept
/// separate from [`crate::bus::EventBus`]: the bus is for in-process,
/// same-transaction-window reactions (e.g. `AutoScheduleSubscriber`),
/// while the outbox exists specifically for delivery that must survive
/// process restarts and broker outages.
pub struct LoggingPublisher;

#[async_trait]
impl Publisher for LoggingPublisher {
    async fn publish(&self, message: &OutboxMessage) -> Result<(), PublishError> {
        tracing::info!(
            routing_key = %message.routing_key,
            aggregate_id = %message.aggregate_id,
            attempts = message.attempts,
            "publishing outbox message"
        );
        Ok(())
    }
}
