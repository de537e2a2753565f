//! Domain events shared by every aggregate.
//!
//! Every event carries the same header so the outbox can route, dedupe, and
//! replay without inspecting event-specific fields (§9 of the design notes).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields present on every domain event, regardless of aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventHeader {
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub occurred_at: DateTime<Utc>,
    pub routing_key: String,
}

/// A tagged domain event. Serializes to canonical JSON for the outbox
/// payload; the aggregate id always appears in the payload (via the
/// header) so consumers can dedupe idempotently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
#[non_exhaustive]
pub enum DomainEvent {
    TaskCreated {
        header: EventHeader,
        owner_id: Uuid,
        title: String,
    },
    TaskCompleted {
        header: EventHeader,
        owner_id: Uuid,
    },
    TaskArchived {
        header: EventHeader,
        owner_id: Uuid,
    },
    HabitCreated {
        header: EventHeader,
        owner_id: Uuid,
        name: String,
    },
    HabitCompleted {
        header: EventHeader,
        owner_id: Uuid,
        streak: u32,
        total_done: u32,
    },
    HabitFrequencyChanged {
        header: EventHeader,
        owner_id: Uuid,
        old_times_per_week: u8,
        new_times_per_week: u8,
    },
    HabitArchived {
        header: EventHeader,
        owner_id: Uuid,
    },
    MeetingCreated {
        header: EventHeader,
        owner_id: Uuid,
        name: String,
    },
    MeetingHeld {
        header: EventHeader,
        owner_id: Uuid,
        held_at: DateTime<Utc>,
    },
    BlockScheduled {
        header: EventHeader,
        owner_id: Uuid,
        schedule_date: chrono::NaiveDate,
        block_id: Uuid,
    },
    BlockRescheduled {
        header: EventHeader,
        owner_id: Uuid,
        block_id: Uuid,
        reason: String,
    },
    BlockRemoved {
        header: EventHeader,
        owner_id: Uuid,
        block_id: Uuid,
    },
    LicenseActivated {
        header: EventHeader,
        owner_id: Uuid,
        plan: String,
    },
    LicenseDeactivated {
        header: EventHeader,
        owner_id: Uuid,
    },
}

impl DomainEvent {
    /// The shared header, regardless of which variant this is.
    pub fn header(&self) -> &EventHeader {
        match self {
            DomainEvent::TaskCreated { header, .. }
            | DomainEvent::TaskCompleted { header, .. }
            | DomainEvent::TaskArchived { header, .. }
            | DomainEvent::HabitCreated { header, .. }
            | DomainEvent::HabitCompleted { header, .. }
            | DomainEvent::HabitFrequencyChanged { header, .. }
            | DomainEvent::HabitArchived { header, .. }
            | DomainEvent::MeetingCreated { header, .. }
            | DomainEvent::MeetingHeld { header, .. }
            | DomainEvent::BlockScheduled { header, .. }
            | DomainEvent::BlockRescheduled { header, .. }
            | DomainEvent::BlockRemoved { header, .. }
            | DomainEvent::LicenseActivated { header, .. }
            | DomainEvent::LicenseDeactivated { header, .. } => header,
        }
    }

    /// Canonical JSON serialization used as the outbox payload.
    pub fn to_canonical_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("DomainEvent always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> EventHeader {
        EventHeader {
            aggregate_id: Uuid::nil(),
            aggregate_type: "Task".to_string(),
            occurred_at: Utc::now(),
            routing_key: "task.created".to_string(),
        }
    }

    #[test]
    fn header_accessor_matches_variant() {
        let event = DomainEvent::TaskCreated {
            header: header(),
            owner_id: Uuid::nil(),
            title: "write report".into(),
        };
        assert_eq!(event.header().routing_key, "task.created");
    }

    #[test]
    fn canonical_json_contains_aggregate_id() {
        let id = Uuid::new_v4();
        let event = DomainEvent::TaskArchived {
            header: EventHeader {
                aggregate_id: id,
                ..header()
            },
            owner_id: Uuid::nil(),
        };
        let json = event.to_canonical_json();
        assert_eq!(json["header"]["aggregate_id"], id.to_string());
    }
}
