//! In-process `OutboxStore`, grounded on `mofa_kernel::storage::Storage`'s
//! `dashmap`-backed pattern. Suitable for tests and single-process
//! deployments; a durable store would implement the same trait against
//! a real database.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use orbita_kernel::domain::outbox::{OutboxMessage, OutboxState};
use orbita_kernel::error::{KernelError, KernelResult};
use orbita_kernel::repository::OutboxStore;

#[derive(Default)]
pub struct InMemoryOutboxStore {
    messages: DashMap<u64, OutboxMessage>,
    next_id: AtomicU64,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        InMemoryOutboxStore {
            messages: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn append(&self, mut message: OutboxMessage) -> KernelResult<OutboxMessage> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        message.id = id;
        self.messages.insert(id, message.clone());
        Ok(message)
    }

    async fn claim_batch(
        &self,
        now: DateTime<Utc>,
        batch_size: usize,
    ) -> KernelResult<Vec<OutboxMessage>> {
        let mut due: Vec<OutboxMessage> = self
            .messages
            .iter()
            .filter(|entry| {
                entry.state == OutboxState::Pending || entry.state == OutboxState::Failed
            })
            .filter(|entry| entry.next_retry_at <= now)
            .map(|entry| entry.value().clone())
            .collect();
        due.sort_by_key(|m| m.created_at);
        due.truncate(batch_size);

        for message in &due {
            if let Some(mut entry) = self.messages.get_mut(&message.id) {
                entry.state = OutboxState::Publishing;
            }
        }
        Ok(due)
    }

    async fn mark_published(&self, id: u64) -> KernelResult<()> {
        let mut entry = self
            .messages
            .get_mut(&id)
            .ok_or(KernelError::NotFound { aggregate: "OutboxMessage", id: id.to_string() })?;
        entry.state = OutboxState::Published;
        Ok(())
    }

    async fn mark_retry(&self, id: u64, next_retry_at: DateTime<Utc>) -> KernelResult<()> {
        let mut entry = self
            .messages
            .get_mut(&id)
            .ok_or(KernelError::NotFound { aggregate: "OutboxMessage", id: id.to_string() })?;
        entry.attempts += 1;
        entry.next_retry_at = next_retry_at;
        entry.state = OutboxState::Failed;
        Ok(())
    }

    async fn mark_dead(&self, id: u64, reason: String) -> KernelResult<()> {
        let mut entry = self
            .messages
            .get_mut(&id)
            .ok_or(KernelError::NotFound { aggregate: "OutboxMessage", id: id.to_string() })?;
        entry.state = OutboxState::Dead;
        entry.dead_reason = Some(reason);
        Ok(())
    }

    async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> KernelResult<Vec<OutboxMessage>> {
        let mut messages: Vec<OutboxMessage> = self
            .messages
            .iter()
            .filter(|entry| entry.created_at >= from && entry.created_at <= to)
            .map(|entry| entry.value().clone())
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }
}
