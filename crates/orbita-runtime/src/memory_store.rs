//! `DashMap`-backed implementation of every kernel repository trait plus
//! `UnitOfWork`/`UnitOfWorkFactory`, grounded on
//! `mofa_kernel::storage::Storage`'s in-memory test double. Suitable for
//! single-process deployments and tests; a durable deployment implements
//! the same traits against a real database.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use orbita_kernel::domain::{Habit, Meeting, OutboxMessage, Schedule, Task};
use orbita_kernel::error::KernelResult;
use orbita_kernel::repository::{
    HabitRepository, MeetingRepository, OutboxStore, ScheduleRepository, TaskRepository,
    UnitOfWork, UnitOfWorkFactory,
};
use uuid::Uuid;

use crate::outbox::InMemoryOutboxStore;

#[derive(Default)]
struct Tables {
    tasks: DashMap<Uuid, Task>,
    habits: DashMap<Uuid, Habit>,
    meetings: DashMap<Uuid, Meeting>,
    schedules: DashMap<(Uuid, chrono::NaiveDate), Schedule>,
}

/// Shared, process-wide store backing every repository. Cloned cheaply
/// (an `Arc` internally) so `InMemoryUnitOfWorkFactory` can hand out a
/// fresh `InMemoryUnitOfWork` per command while all of them see the same
/// underlying tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Tables>,
    outbox: Arc<InMemoryOutboxStore>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            tables: Arc::new(Tables::default()),
            outbox: Arc::new(InMemoryOutboxStore::new()),
        }
    }

    pub fn outbox(&self) -> Arc<InMemoryOutboxStore> {
        self.outbox.clone()
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn save(&self, task: &Task) -> KernelResult<()> {
        self.tables.tasks.insert(task.id, task.clone());
        Ok(())
    }
    async fn find_by_id(&self, id: Uuid) -> KernelResult<Option<Task>> {
        Ok(self.tables.tasks.get(&id).map(|e| e.value().clone()))
    }
    async fn list_by_owner(&self, owner_id: Uuid) -> KernelResult<Vec<Task>> {
        Ok(self
            .tables
            .tasks
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .map(|e| e.value().clone())
            .collect())
    }
}

#[async_trait]
impl HabitRepository for InMemoryStore {
    async fn save(&self, habit: &Habit) -> KernelResult<()> {
        self.tables.habits.insert(habit.id, habit.clone());
        Ok(())
    }
    async fn find_by_id(&self, id: Uuid) -> KernelResult<Option<Habit>> {
        Ok(self.tables.habits.get(&id).map(|e| e.value().clone()))
    }
    async fn list_by_owner(&self, owner_id: Uuid) -> KernelResult<Vec<Habit>> {
        Ok(self
            .tables
            .habits
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .map(|e| e.value().clone())
            .collect())
    }
}

#[async_trait]
impl MeetingRepository for InMemoryStore {
    async fn save(&self, meeting: &Meeting) -> KernelResult<()> {
        self.tables.meetings.insert(meeting.id, meeting.clone());
        Ok(())
    }
    async fn find_by_id(&self, id: Uuid) -> KernelResult<Option<Meeting>> {
        Ok(self.tables.meetings.get(&id).map(|e| e.value().clone()))
    }
    async fn list_by_owner(&self, owner_id: Uuid) -> KernelResult<Vec<Meeting>> {
        Ok(self
            .tables
            .meetings
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .map(|e| e.value().clone())
            .collect())
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryStore {
    async fn save(&self, schedule: &Schedule) -> KernelResult<()> {
        self.tables
            .schedules
            .insert((schedule.owner_id, schedule.date), schedule.clone());
        Ok(())
    }
    async fn find_by_owner_and_date(
        &self,
        owner_id: Uuid,
        date: chrono::NaiveDate,
    ) -> KernelResult<Option<Schedule>> {
        Ok(self
            .tables
            .schedules
            .get(&(owner_id, date))
            .map(|e| e.value().clone()))
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn append(&self, message: OutboxMessage) -> KernelResult<OutboxMessage> {
        self.outbox.append(message).await
    }
    async fn claim_batch(
        &self,
        now: chrono::DateTime<chrono::Utc>,
        batch_size: usize,
    ) -> KernelResult<Vec<OutboxMessage>> {
        self.outbox.claim_batch(now, batch_size).await
    }
    async fn mark_published(&self, id: u64) -> KernelResult<()> {
        self.outbox.mark_published(id).await
    }
    async fn mark_retry(
        &self,
        id: u64,
        next_retry_at: chrono::DateTime<chrono::Utc>,
    ) -> KernelResult<()> {
        self.outbox.mark_retry(id, next_retry_at).await
    }
    async fn mark_dead(&self, id: u64, reason: String) -> KernelResult<()> {
        self.outbox.mark_dead(id, reason).await
    }
    async fn list_between(
        &self,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
    ) -> KernelResult<Vec<OutboxMessage>> {
        self.outbox.list_between(from, to).await
    }
}

/// A no-op unit of work over [`InMemoryStore`]: every repository writes
/// immediately, so `commit` has nothing left to do. A durable
/// implementation would instead bind a real transaction handle here and
/// flush it on `commit`.
pub struct InMemoryUnitOfWork {
    store: InMemoryStore,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    fn tasks(&self) -> &dyn TaskRepository {
        &self.store
    }
    fn habits(&self) -> &dyn HabitRepository {
        &self.store
    }
    fn meetings(&self) -> &dyn MeetingRepository {
        &self.store
    }
    fn schedules(&self) -> &dyn ScheduleRepository {
        &self.store
    }
    fn outbox(&self) -> &dyn OutboxStore {
        &self.store
    }
    async fn commit(self: Box<Self>) -> KernelResult<()> {
        Ok(())
    }
}

pub struct InMemoryUnitOfWorkFactory {
    store: InMemoryStore,
}

impl InMemoryUnitOfWorkFactory {
    pub fn new(store: InMemoryStore) -> Self {
        InMemoryUnitOfWorkFactory { store }
    }
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryUnitOfWorkFactory {
    async fn begin(&self) -> KernelResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(InMemoryUnitOfWork {
            store: self.store.clone(),
        }))
    }
}
