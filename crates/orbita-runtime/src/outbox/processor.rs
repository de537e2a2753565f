//! The outbox poll loop: claim a batch, attempt to publish each
//! message, and reschedule or dead-letter on failure.

use std::sync::Arc;

use orbita_kernel::repository::OutboxStore;
use orbita_kernel::Clock;

use super::backoff::next_retry_delay;
use super::sink::Publisher;
use crate::config::OutboxConfig;

pub struct OutboxProcessor {
    store: Arc<dyn OutboxStore>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
    config: OutboxConfig,
}

impl OutboxProcessor {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
        config: OutboxConfig,
    ) -> Self {
        OutboxProcessor {
            store,
            publisher,
            clock,
            config,
        }
    }

    /// Claim one batch and attempt to publish each message, returning
    /// the number of messages published. A message whose `attempts`
    /// reaches `config.max_retries` after a failed publish is marked
    /// dead rather than rescheduled.
    pub async fn run_once(&self) -> orbita_kernel::KernelResult<usize> {
        let now = self.clock.now();
        let batch = self.store.claim_batch(now, self.config.batch_size).await?;
        let mut published = 0;

        for message in batch {
            match self.publisher.publish(&message).await {
                Ok(()) => {
                    self.store.mark_published(message.id).await?;
                    published += 1;
                }
                Err(error) => {
                    if message.attempts + 1 >= self.config.max_retries {
                        self.store.mark_dead(message.id, error.to_string()).await?;
                        tracing::warn!(
                            outbox_id = message.id,
                            routing_key = %message.routing_key,
                            "outbox message exhausted retries, marked dead"
                        );
                    } else {
                        let delay = next_retry_delay(
                            message.attempts + 1,
                            self.config.base_backoff_ms,
                            self.config.max_backoff_ms,
                        );
                        let next_retry_at = now
                            + chrono::Duration::milliseconds(delay.as_millis() as i64);
                        self.store.mark_retry(message.id, next_retry_at).await?;
                    }
                }
            }
        }
        Ok(published)
    }

    /// Runs [`Self::run_once`] on a fixed interval until `shutdown`
    /// resolves, draining in-flight work on the way out by running one
    /// final `run_once` after the signal fires.
    pub async fn run_until(
        &self,
        mut shutdown: tokio::sync::oneshot::Receiver<()>,
    ) -> orbita_kernel::KernelResult<()> {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_millis(self.config.poll_interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(error) = self.run_once().await {
                        tracing::error!(%error, "outbox poll failed");
                    }
                }
                _ = &mut shutdown => {
                    let _ = self.run_once().await;
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::memory_store::InMemoryOutboxStore;
    use orbita_kernel::domain::events::{DomainEvent, EventHeader};
    use orbita_kernel::domain::outbox::OutboxMessage;
    use orbita_kernel::FixedClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct FlakyPublisher {
        failures_remaining: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Publisher for FlakyPublisher {
        async fn publish(
            &self,
            _message: &orbita_kernel::domain::outbox::OutboxMessage,
        ) -> Result<(), super::super::sink::PublishError> {
            if self.failures_remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(super::super::sink::PublishError("simulated failure".into()))
            } else {
                Ok(())
            }
        }
    }

    fn sample_event() -> DomainEvent {
        DomainEvent::TaskCreated {
            header: EventHeader {
                aggregate_id: Uuid::new_v4(),
                aggregate_type: "Task".to_string(),
                occurred_at: chrono::Utc::now(),
                routing_key: "task.created".to_string(),
            },
            owner_id: Uuid::new_v4(),
            title: "write report".into(),
        }
    }

    #[tokio::test]
    async fn publishes_pending_messages() {
        let store: Arc<dyn OutboxStore> = Arc::new(InMemoryOutboxStore::new());
        let now = chrono::Utc::now();
        store
            .append(OutboxMessage::from_event(&sample_event(), now))
            .await
            .unwrap();

        let processor = OutboxProcessor::new(
            store,
            Arc::new(super::super::sink::LoggingPublisher),
            Arc::new(FixedClock(now)),
            OutboxConfig::default(),
        );
        let published = processor.run_once().await.unwrap();
        assert_eq!(published, 1);
    }

    #[tokio::test]
    async fn dead_letters_after_exhausting_retries() {
        let store: Arc<dyn OutboxStore> = Arc::new(InMemoryOutboxStore::new());
        let now = chrono::Utc::now();
        let appended = store
            .append(OutboxMessage::from_event(&sample_event(), now))
            .await
            .unwrap();

        let mut config = OutboxConfig::default();
        config.max_retries = 1;
        let processor = OutboxProcessor::new(
            store.clone(),
            Arc::new(FlakyPublisher {
                failures_remaining: AtomicUsize::new(10),
            }),
            Arc::new(FixedClock(now)),
            config,
        );
        processor.run_once().await.unwrap();

        let listed = store
            .list_between(now - chrono::Duration::seconds(1), now + chrono::Duration::seconds(1))
            .await
            .unwrap();
        let message = listed.iter().find(|m| m.id == appended.id).unwrap();
        assert_eq!(message.state, orbita_kernel::domain::outbox::OutboxState::Dead);
    }
}
