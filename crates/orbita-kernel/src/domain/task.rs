//! Task aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{DomainEvent, EventHeader};
use crate::error::{KernelError, KernelResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub estimated_minutes: u32,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new active task. Errors if the title is empty or the
    /// duration is non-positive.
    pub fn create(
        owner_id: Uuid,
        title: impl Into<String>,
        description: Option<String>,
        priority: Priority,
        estimated_minutes: u32,
        now: DateTime<Utc>,
    ) -> KernelResult<(Self, DomainEvent)> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(KernelError::Validation("task title must not be empty".into()));
        }
        if estimated_minutes < 1 {
            return Err(KernelError::Validation(
                "estimatedMinutes must be >= 1".into(),
            ));
        }
        let id = Uuid::new_v4();
        let task = Task {
            id,
            owner_id,
            title: title.clone(),
            description,
            priority,
            estimated_minutes,
            status: TaskStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let event = DomainEvent::TaskCreated {
            header: EventHeader {
                aggregate_id: id,
                aggregate_type: "Task".to_string(),
                occurred_at: now,
                routing_key: "task.created".to_string(),
            },
            owner_id,
            title,
        };
        Ok((task, event))
    }

    fn assert_owner(&self, caller: Uuid) -> KernelResult<()> {
        if self.owner_id != caller {
            return Err(KernelError::NotOwner {
                aggregate: "Task",
                id: self.id.to_string(),
            });
        }
        Ok(())
    }

    /// One-way transition active -> completed. `estimatedMinutes` becomes
    /// immutable once this succeeds.
    pub fn complete(
        &mut self,
        caller: Uuid,
        now: DateTime<Utc>,
    ) -> KernelResult<DomainEvent> {
        self.assert_owner(caller)?;
        if self.status != TaskStatus::Active {
            return Err(KernelError::Conflict(format!(
                "task {} is not active",
                self.id
            )));
        }
        self.status = TaskStatus::Completed;
        self.updated_at = now;
        Ok(DomainEvent::TaskCompleted {
            header: EventHeader {
                aggregate_id: self.id,
                aggregate_type: "Task".to_string(),
                occurred_at: now,
                routing_key: "task.completed".to_string(),
            },
            owner_id: self.owner_id,
        })
    }

    /// One-way transition active -> archived.
    pub fn archive(&mut self, caller: Uuid, now: DateTime<Utc>) -> KernelResult<DomainEvent> {
        self.assert_owner(caller)?;
        if self.status != TaskStatus::Active {
            return Err(KernelError::Conflict(format!(
                "task {} is not active",
                self.id
            )));
        }
        self.status = TaskStatus::Archived;
        self.updated_at = now;
        Ok(DomainEvent::TaskArchived {
            header: EventHeader {
                aggregate_id: self.id,
                aggregate_type: "Task".to_string(),
                occurred_at: now,
                routing_key: "task.archived".to_string(),
            },
            owner_id: self.owner_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn create_rejects_empty_title() {
        let owner = Uuid::new_v4();
        let result = Task::create(owner, "   ", None, Priority::Normal, 30, now());
        assert!(result.is_err());
    }

    #[test]
    fn create_rejects_zero_duration() {
        let owner = Uuid::new_v4();
        let result = Task::create(owner, "write report", None, Priority::Normal, 0, now());
        assert!(result.is_err());
    }

    #[test]
    fn complete_then_archive_is_rejected() {
        let owner = Uuid::new_v4();
        let (mut task, _) =
            Task::create(owner, "write report", None, Priority::High, 60, now()).unwrap();
        task.complete(owner, now()).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        let result = task.archive(owner, now());
        assert!(result.is_err());
    }

    #[test]
    fn non_owner_cannot_complete() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let (mut task, _) =
            Task::create(owner, "write report", None, Priority::Normal, 30, now()).unwrap();
        let err = task.complete(stranger, now()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotOwner);
    }
}
