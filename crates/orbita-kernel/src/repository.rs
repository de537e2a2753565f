//! Repository contracts and the unit-of-work seam.
//!
//! These traits are the kernel's entire dependency on persistence; no
//! concrete database driver is part of this crate (§1 — DB driver code is
//! an external collaborator). Every finder returns `Ok(None)` rather than
//! an error when the entity is absent, and `save` is an upsert, matching
//! §6. Grounded on `mofa_kernel::storage::Storage<K, V>`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Habit, Meeting, OutboxMessage, Schedule, Task};
use crate::error::KernelResult;

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn save(&self, task: &Task) -> KernelResult<()>;
    async fn find_by_id(&self, id: Uuid) -> KernelResult<Option<Task>>;
    async fn list_by_owner(&self, owner_id: Uuid) -> KernelResult<Vec<Task>>;
}

#[async_trait]
pub trait HabitRepository: Send + Sync {
    async fn save(&self, habit: &Habit) -> KernelResult<()>;
    async fn find_by_id(&self, id: Uuid) -> KernelResult<Option<Habit>>;
    async fn list_by_owner(&self, owner_id: Uuid) -> KernelResult<Vec<Habit>>;
}

#[async_trait]
pub trait MeetingRepository: Send + Sync {
    async fn save(&self, meeting: &Meeting) -> KernelResult<()>;
    async fn find_by_id(&self, id: Uuid) -> KernelResult<Option<Meeting>>;
    async fn list_by_owner(&self, owner_id: Uuid) -> KernelResult<Vec<Meeting>>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn save(&self, schedule: &Schedule) -> KernelResult<()>;
    async fn find_by_owner_and_date(
        &self,
        owner_id: Uuid,
        date: chrono::NaiveDate,
    ) -> KernelResult<Option<Schedule>>;
}

/// Durable queue of outbox messages. `append` is called from inside a
/// [`UnitOfWork`], in the same atomic write as the aggregate save.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn append(&self, message: OutboxMessage) -> KernelResult<OutboxMessage>;

    /// Pending messages due for a publish attempt, oldest-created first,
    /// atomically transitioned to `publishing` as part of the claim.
    async fn claim_batch(
        &self,
        now: chrono::DateTime<chrono::Utc>,
        batch_size: usize,
    ) -> KernelResult<Vec<OutboxMessage>>;

    async fn mark_published(&self, id: u64) -> KernelResult<()>;
    async fn mark_retry(
        &self,
        id: u64,
        next_retry_at: chrono::DateTime<chrono::Utc>,
    ) -> KernelResult<()>;
    async fn mark_dead(&self, id: u64, reason: String) -> KernelResult<()>;

    async fn list_between(
        &self,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
    ) -> KernelResult<Vec<OutboxMessage>>;
}

/// A transaction scope shared between aggregate repositories and the
/// outbox within one atomic write. Implementations bind an active
/// transaction handle to the call; repositories obtained from the same
/// `UnitOfWork` instance join that transaction.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn tasks(&self) -> &dyn TaskRepository;
    fn habits(&self) -> &dyn HabitRepository;
    fn meetings(&self) -> &dyn MeetingRepository;
    fn schedules(&self) -> &dyn ScheduleRepository;
    fn outbox(&self) -> &dyn OutboxStore;

    /// Commit the transaction. Command handlers call this after every
    /// aggregate save and outbox append has succeeded; on any prior error
    /// the unit of work is dropped without committing (§7 — "the domain
    /// layer never partially mutates on failure").
    async fn commit(self: Box<Self>) -> KernelResult<()>;
}

/// Opens a fresh [`UnitOfWork`] per command. Grounded on
/// `mofa_foundation::persistence::traits::StoreFactory`.
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> KernelResult<Box<dyn UnitOfWork>>;
}
