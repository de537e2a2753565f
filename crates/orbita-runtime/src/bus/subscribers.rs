//! Built-in subscribers that react to domain events emitted through the
//! [`super::EventBus`].

use std::collections::VecDeque;

use orbita_kernel::domain::schedule::BlockKind;
use orbita_kernel::domain::DomainEvent;
use parking_lot::Mutex;
use uuid::Uuid;

use super::EventSubscriber;

/// An item queued for placement by `AutoSchedule`.
#[derive(Debug, Clone)]
pub struct PendingAutoSchedule {
    pub owner_id: Uuid,
    pub kind: BlockKind,
    pub source_id: Uuid,
}

/// Reacts to `TaskCreated`, `HabitCreated`, and `MeetingCreated` by
/// queueing the underlying item for placement. Queued because placement
/// needs repository access the synchronous [`EventSubscriber::handle`]
/// call cannot make; `OrbitaService` drains the queue immediately after
/// the command that triggered it.
///
/// Removing a block does not flow through here: the command handler
/// that removes a block already holds the `Block`'s kind and source id
/// directly, so it re-queues via [`AutoScheduleSubscriber::push`]
/// without needing to recover that information from an event.
///
/// Idempotent: re-queueing the same source id twice before it's drained
/// is harmless — `AutoSchedule` is itself idempotent against items that
/// already hold a scheduled block.
#[derive(Default)]
pub struct AutoScheduleSubscriber {
    pending: Mutex<VecDeque<PendingAutoSchedule>>,
}

impl AutoScheduleSubscriber {
    pub fn new() -> Self {
        AutoScheduleSubscriber {
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, item: PendingAutoSchedule) {
        self.pending.lock().push_back(item);
    }

    pub fn drain(&self) -> Vec<PendingAutoSchedule> {
        self.pending.lock().drain(..).collect()
    }
}

impl EventSubscriber for AutoScheduleSubscriber {
    fn handle(&self, event: &DomainEvent) {
        let item = match event {
            DomainEvent::TaskCreated {
                header, owner_id, ..
            } => Some(PendingAutoSchedule {
                owner_id: *owner_id,
                kind: BlockKind::Task,
                source_id: header.aggregate_id,
            }),
            DomainEvent::HabitCreated {
                header, owner_id, ..
            } => Some(PendingAutoSchedule {
                owner_id: *owner_id,
                kind: BlockKind::Habit,
                source_id: header.aggregate_id,
            }),
            DomainEvent::MeetingCreated {
                header, owner_id, ..
            } => Some(PendingAutoSchedule {
                owner_id: *owner_id,
                kind: BlockKind::Meeting,
                source_id: header.aggregate_id,
            }),
            _ => None,
        };
        if let Some(item) = item {
            self.pending.lock().push_back(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbita_kernel::domain::events::EventHeader;

    #[test]
    fn queues_task_created_for_placement() {
        let subscriber = AutoScheduleSubscriber::new();
        let owner = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        subscriber.handle(&DomainEvent::TaskCreated {
            header: EventHeader {
                aggregate_id: task_id,
                aggregate_type: "Task".to_string(),
                occurred_at: chrono::Utc::now(),
                routing_key: "task.created".to_string(),
            },
            owner_id: owner,
            title: "write report".into(),
        });
        let pending = subscriber.drain();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].source_id, task_id);
        assert_eq!(pending[0].kind, BlockKind::Task);
        assert!(subscriber.drain().is_empty());
    }

    #[test]
    fn ignores_unrelated_events() {
        let subscriber = AutoScheduleSubscriber::new();
        subscriber.handle(&DomainEvent::LicenseDeactivated {
            header: EventHeader {
                aggregate_id: Uuid::new_v4(),
                aggregate_type: "License".to_string(),
                occurred_at: chrono::Utc::now(),
                routing_key: "license.deactivated".to_string(),
            },
            owner_id: Uuid::new_v4(),
        });
        assert!(subscriber.drain().is_empty());
    }
}
