//! OutboxMessage: the standalone aggregate backing the transactional
//! outbox (§4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::DomainEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxState {
    Pending,
    Publishing,
    Published,
    Failed,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// Monotonically assigned by the store at append time.
    pub id: u64,
    pub routing_key: String,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub next_retry_at: DateTime<Utc>,
    pub state: OutboxState,
    pub created_at: DateTime<Utc>,
    pub dead_reason: Option<String>,
}

impl OutboxMessage {
    /// Build a pending message from a domain event, `id` to be assigned by
    /// the store on append.
    pub fn from_event(event: &DomainEvent, created_at: DateTime<Utc>) -> Self {
        let header = event.header();
        OutboxMessage {
            id: 0,
            routing_key: header.routing_key.clone(),
            aggregate_type: header.aggregate_type.clone(),
            aggregate_id: header.aggregate_id,
            occurred_at: header.occurred_at,
            payload: event.to_canonical_json(),
            attempts: 0,
            next_retry_at: created_at,
            state: OutboxState::Pending,
            created_at,
            dead_reason: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, OutboxState::Published | OutboxState::Dead)
    }
}
