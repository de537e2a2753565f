//! The command/query surface: wires the repositories, the scheduler, the
//! habit learner, the event bus, and the entitlement gate together.
//! Grounded on `mofa_runtime`'s service-layer split from `mofa-kernel`'s
//! pure trait contracts — every method here is orchestration, no domain
//! rule lives in this file.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use orbita_kernel::domain::habit::PreferredTime;
use orbita_kernel::domain::schedule::{Block, BlockKind, Interval, RescheduleAttempt, Schedule};
use orbita_kernel::domain::task::Priority;
use orbita_kernel::domain::{Cadence, DomainEvent, EventHeader, Frequency, Habit, License, Meeting, OutboxMessage, Task};
use orbita_kernel::error::{KernelError, KernelResult};
use orbita_kernel::repository::UnitOfWork;
use orbita_kernel::Clock;
use uuid::Uuid;

use crate::bus::{AutoScheduleSubscriber, EventBus};
use crate::calendar::{CalendarSyncCoordinator, CalendarSyncError, ConnectedCalendar, SyncReport};
use crate::habit_learner;
use crate::license::EntitlementService;
use crate::scheduler::{self, PlacementOutcome, SchedulerError, UnplacedItem, WorkingWindow};

use orbita_kernel::domain::license::EntitlementModule;
use orbita_kernel::repository::UnitOfWorkFactory;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result of a per-owner `AdjustHabitFrequency` batch pass (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HabitFrequencyAdjustmentSummary {
    pub evaluated: usize,
    pub updated: usize,
}

pub struct OrbitaService {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
    bus: Arc<EventBus>,
    auto_scheduler: Arc<AutoScheduleSubscriber>,
    entitlements: Arc<EntitlementService>,
    clock: Arc<dyn Clock>,
    window: WorkingWindow,
    reschedule_log: DashMap<Uuid, Vec<RescheduleAttempt>>,
}

impl OrbitaService {
    pub fn new(
        uow_factory: Arc<dyn UnitOfWorkFactory>,
        entitlements: Arc<EntitlementService>,
        clock: Arc<dyn Clock>,
        window: WorkingWindow,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        let auto_scheduler = Arc::new(AutoScheduleSubscriber::new());
        bus.subscribe(auto_scheduler.clone());
        OrbitaService {
            uow_factory,
            bus,
            auto_scheduler,
            entitlements,
            clock,
            window,
            reschedule_log: DashMap::new(),
        }
    }

    async fn begin(&self) -> KernelResult<Box<dyn UnitOfWork>> {
        self.uow_factory.begin().await
    }

    async fn commit_with_outbox(
        &self,
        uow: Box<dyn UnitOfWork>,
        event: &DomainEvent,
        now: DateTime<Utc>,
    ) -> KernelResult<()> {
        uow.outbox()
            .append(OutboxMessage::from_event(event, now))
            .await?;
        uow.commit().await?;
        self.bus.publish(event);
        Ok(())
    }

    // ---- Tasks ----

    pub async fn create_task(
        &self,
        owner_id: Uuid,
        title: impl Into<String>,
        description: Option<String>,
        priority: Priority,
        estimated_minutes: u32,
    ) -> KernelResult<Task> {
        let now = self.clock.now();
        let (task, event) = Task::create(owner_id, title, description, priority, estimated_minutes, now)?;
        let uow = self.begin().await?;
        uow.tasks().save(&task).await?;
        self.commit_with_outbox(uow, &event, now).await?;
        self.drain_pending_auto_schedule(owner_id).await?;
        Ok(task)
    }

    pub async fn complete_task(&self, caller: Uuid, task_id: Uuid) -> KernelResult<Task> {
        let now = self.clock.now();
        let uow = self.begin().await?;
        let mut task = uow
            .tasks()
            .find_by_id(task_id)
            .await?
            .ok_or(KernelError::NotFound { aggregate: "Task", id: task_id.to_string() })?;
        let event = task.complete(caller, now)?;
        uow.tasks().save(&task).await?;
        self.commit_with_outbox(uow, &event, now).await?;
        Ok(task)
    }

    pub async fn archive_task(&self, caller: Uuid, task_id: Uuid) -> KernelResult<Task> {
        let now = self.clock.now();
        let uow = self.begin().await?;
        let mut task = uow
            .tasks()
            .find_by_id(task_id)
            .await?
            .ok_or(KernelError::NotFound { aggregate: "Task", id: task_id.to_string() })?;
        let event = task.archive(caller, now)?;
        uow.tasks().save(&task).await?;
        self.commit_with_outbox(uow, &event, now).await?;
        Ok(task)
    }

    pub async fn list_tasks(&self, owner_id: Uuid) -> KernelResult<Vec<Task>> {
        let uow = self.begin().await?;
        uow.tasks().list_by_owner(owner_id).await
    }

    // ---- Habits ----

    #[allow(clippy::too_many_arguments)]
    pub async fn create_habit(
        &self,
        owner_id: Uuid,
        name: impl Into<String>,
        description: Option<String>,
        frequency: Frequency,
        times_per_week: u8,
        duration_minutes: u32,
        preferred_time: PreferredTime,
    ) -> KernelResult<Habit> {
        let now = self.clock.now();
        let (habit, event) = Habit::create(
            owner_id,
            name,
            description,
            frequency,
            times_per_week,
            duration_minutes,
            preferred_time,
            now,
        )?;
        let uow = self.begin().await?;
        uow.habits().save(&habit).await?;
        self.commit_with_outbox(uow, &event, now).await?;
        self.drain_pending_auto_schedule(owner_id).await?;
        Ok(habit)
    }

    pub async fn log_habit_completion(
        &self,
        caller: Uuid,
        habit_id: Uuid,
        completed_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> KernelResult<Habit> {
        let now = self.clock.now();
        let uow = self.begin().await?;
        let mut habit = uow
            .habits()
            .find_by_id(habit_id)
            .await?
            .ok_or(KernelError::NotFound { aggregate: "Habit", id: habit_id.to_string() })?;
        let event = habit.log_completion(caller, completed_at, notes, now)?;
        uow.habits().save(&habit).await?;
        self.commit_with_outbox(uow, &event, now).await?;
        Ok(habit)
    }

    pub async fn archive_habit(&self, caller: Uuid, habit_id: Uuid) -> KernelResult<Habit> {
        let now = self.clock.now();
        let uow = self.begin().await?;
        let mut habit = uow
            .habits()
            .find_by_id(habit_id)
            .await?
            .ok_or(KernelError::NotFound { aggregate: "Habit", id: habit_id.to_string() })?;
        let event = habit.archive(caller, now)?;
        uow.habits().save(&habit).await?;
        self.commit_with_outbox(uow, &event, now).await?;
        Ok(habit)
    }

    /// Recompute one habit's weekly target from its trailing completion
    /// ratio. Gated on the `adaptive-frequency` entitlement.
    async fn adjust_one_habit_frequency(
        &self,
        caller: Uuid,
        habit_id: Uuid,
        end: NaiveDate,
        window_days: i64,
    ) -> ServiceResult<Habit> {
        let now = self.clock.now();
        let uow = self.begin().await?;
        let mut habit = uow
            .habits()
            .find_by_id(habit_id)
            .await?
            .ok_or(KernelError::NotFound { aggregate: "Habit", id: habit_id.to_string() })?;
        if let Some(event) = habit_learner::adjust_adaptive_frequency(&mut habit, caller, end, window_days, now)? {
            uow.habits().save(&habit).await?;
            self.commit_with_outbox(uow, &event, now).await?;
        } else {
            uow.commit().await?;
        }
        Ok(habit)
    }

    /// `AdjustHabitFrequency{userId, windowDays=14}` (spec §6): evaluates
    /// every one of `owner_id`'s non-archived habits against its trailing
    /// `window_days`-day completion ratio, adjusting each that crosses a
    /// threshold. Gated on the `adaptive-frequency` entitlement.
    pub async fn adjust_habit_frequencies(
        &self,
        owner_id: Uuid,
        end: NaiveDate,
        window_days: i64,
    ) -> ServiceResult<HabitFrequencyAdjustmentSummary> {
        self.entitlements.require(EntitlementModule::AdaptiveFrequency)?;
        let habits = {
            let uow = self.begin().await?;
            uow.habits().list_by_owner(owner_id).await?
        };

        let mut evaluated = 0;
        let mut updated = 0;
        for habit in habits.into_iter().filter(|h| !h.archived) {
            evaluated += 1;
            let times_per_week = habit.times_per_week;
            let adjusted = self
                .adjust_one_habit_frequency(owner_id, habit.id, end, window_days)
                .await?;
            if adjusted.times_per_week != times_per_week {
                updated += 1;
            }
        }
        Ok(HabitFrequencyAdjustmentSummary { evaluated, updated })
    }

    /// Best time-of-day suggestion for `habit`. Gated on `smart-habits`.
    pub fn suggest_habit_time(
        &self,
        habit: &Habit,
        date: NaiveDate,
    ) -> ServiceResult<DateTime<Utc>> {
        self.entitlements.require(EntitlementModule::SmartHabits)?;
        Ok(habit_learner::suggested_start_instant(habit, date))
    }

    pub async fn list_habits(&self, owner_id: Uuid) -> KernelResult<Vec<Habit>> {
        let uow = self.begin().await?;
        uow.habits().list_by_owner(owner_id).await
    }

    // ---- Meetings ----

    /// Gated on `smart-1to1`.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_meeting(
        &self,
        owner_id: Uuid,
        name: impl Into<String>,
        cadence: Cadence,
        cadence_days: u32,
        duration_minutes: u32,
        preferred_time_of_day: chrono::Duration,
    ) -> ServiceResult<Meeting> {
        self.entitlements.require(EntitlementModule::Smart1to1)?;
        let now = self.clock.now();
        let (meeting, event) = Meeting::create(
            owner_id,
            name,
            cadence,
            cadence_days,
            duration_minutes,
            preferred_time_of_day,
            now,
        )?;
        let uow = self.begin().await?;
        uow.meetings().save(&meeting).await?;
        self.commit_with_outbox(uow, &event, now).await?;
        self.drain_pending_auto_schedule(owner_id).await?;
        Ok(meeting)
    }

    pub async fn mark_meeting_held(
        &self,
        caller: Uuid,
        meeting_id: Uuid,
        held_at: DateTime<Utc>,
    ) -> KernelResult<Meeting> {
        let now = self.clock.now();
        let uow = self.begin().await?;
        let mut meeting = uow
            .meetings()
            .find_by_id(meeting_id)
            .await?
            .ok_or(KernelError::NotFound { aggregate: "Meeting", id: meeting_id.to_string() })?;
        let event = meeting.mark_held(caller, held_at, now)?;
        uow.meetings().save(&meeting).await?;
        self.commit_with_outbox(uow, &event, now).await?;
        Ok(meeting)
    }

    pub async fn archive_meeting(&self, caller: Uuid, meeting_id: Uuid) -> KernelResult<Meeting> {
        let uow = self.begin().await?;
        let mut meeting = uow
            .meetings()
            .find_by_id(meeting_id)
            .await?
            .ok_or(KernelError::NotFound { aggregate: "Meeting", id: meeting_id.to_string() })?;
        meeting.archive(caller)?;
        uow.meetings().save(&meeting).await?;
        uow.commit().await?;
        Ok(meeting)
    }

    /// `AdjustMeetingCadence{meetingId, cadenceDays}` (spec §6).
    pub async fn adjust_meeting_cadence(
        &self,
        caller: Uuid,
        meeting_id: Uuid,
        new_cadence_days: u32,
    ) -> KernelResult<Meeting> {
        let uow = self.begin().await?;
        let mut meeting = uow
            .meetings()
            .find_by_id(meeting_id)
            .await?
            .ok_or(KernelError::NotFound { aggregate: "Meeting", id: meeting_id.to_string() })?;
        meeting.adjust_cadence(caller, new_cadence_days)?;
        uow.meetings().save(&meeting).await?;
        uow.commit().await?;
        Ok(meeting)
    }

    // ---- Schedule ----

    pub async fn get_schedule(&self, owner_id: Uuid, date: NaiveDate) -> KernelResult<Schedule> {
        let uow = self.begin().await?;
        Ok(uow
            .schedules()
            .find_by_owner_and_date(owner_id, date)
            .await?
            .unwrap_or_else(|| Schedule::new(owner_id, date)))
    }

    pub async fn find_available_slots(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> KernelResult<Vec<Interval>> {
        let schedule = self.get_schedule(owner_id, date).await?;
        Ok(scheduler::free_intervals(&schedule, &self.window)
            .into_iter()
            .filter(|iv| iv.duration_minutes() >= duration_minutes as i64)
            .collect())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn add_block(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        kind: BlockKind,
        source_id: impl Into<String>,
        title: impl Into<String>,
        duration_minutes: u32,
        anchor: Option<DateTime<Utc>>,
        preferred_time: Option<PreferredTime>,
    ) -> ServiceResult<Block> {
        let now = self.clock.now();
        let mut schedule = self.get_schedule(owner_id, date).await?;
        let block = scheduler::place(
            &mut schedule,
            &self.window,
            scheduler::PlacementRequest {
                kind,
                source_id: source_id.into(),
                title: title.into(),
                duration_minutes,
                anchor,
                preferred_time,
            },
        )?;
        let event = DomainEvent::BlockScheduled {
            header: EventHeader {
                aggregate_id: block.id,
                aggregate_type: "Block".to_string(),
                occurred_at: now,
                routing_key: "block.scheduled".to_string(),
            },
            owner_id,
            schedule_date: date,
            block_id: block.id,
        };
        let uow = self.begin().await?;
        uow.schedules().save(&schedule).await?;
        self.commit_with_outbox(uow, &event, now).await?;
        Ok(block)
    }

    pub async fn complete_block(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        block_id: Uuid,
    ) -> KernelResult<()> {
        let mut schedule = self.get_schedule(owner_id, date).await?;
        schedule.complete_block(block_id)?;
        let uow = self.begin().await?;
        uow.schedules().save(&schedule).await?;
        uow.commit().await?;
        Ok(())
    }

    /// Removes `block_id` and, unless it was an externally imported
    /// block, re-queues its source for auto-scheduling (the command
    /// handler already holds the block's kind and source id, so it
    /// pushes directly rather than round-tripping through a domain
    /// event).
    pub async fn remove_block(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        block_id: Uuid,
    ) -> KernelResult<()> {
        let now = self.clock.now();
        let mut schedule = self.get_schedule(owner_id, date).await?;
        let removed = schedule
            .find_block_mut(block_id)
            .ok_or(KernelError::NotFound { aggregate: "Block", id: block_id.to_string() })?
            .clone();
        schedule.remove_block(block_id)?;

        let event = DomainEvent::BlockRemoved {
            header: EventHeader {
                aggregate_id: block_id,
                aggregate_type: "Block".to_string(),
                occurred_at: now,
                routing_key: "block.removed".to_string(),
            },
            owner_id,
            block_id,
        };
        let uow = self.begin().await?;
        uow.schedules().save(&schedule).await?;
        self.commit_with_outbox(uow, &event, now).await?;

        if removed.kind != BlockKind::External {
            if let Ok(source_id) = removed.source_id.parse::<Uuid>() {
                self.auto_scheduler.push(crate::bus::subscribers::PendingAutoSchedule {
                    owner_id,
                    kind: removed.kind,
                    source_id,
                });
            }
        }
        Ok(())
    }

    /// Try in-day shift-later then shift-earlier; if both fail, bump the
    /// block to the next working day's schedule; if that also fails,
    /// remove the block for good and emit its removal (spec §4.1's
    /// terminal case). Returns the attempt that resolved (or recorded
    /// the exhaustion of) the conflict.
    pub async fn reschedule_block(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        block_id: Uuid,
        reason: impl Into<String>,
    ) -> ServiceResult<RescheduleAttempt> {
        self.entitlements.require(EntitlementModule::AutoRescheduler)?;
        let now = self.clock.now();
        let reason = reason.into();
        let mut schedule = self.get_schedule(owner_id, date).await?;
        let log = self
            .reschedule_log
            .get(&owner_id)
            .map(|entry| entry.clone())
            .unwrap_or_default();

        let attempt = scheduler::auto_reschedule(&mut schedule, &self.window, &log, block_id, reason.clone(), now);

        let attempt = match attempt {
            Ok(attempt) if attempt.to_interval.is_some() => {
                self.save_schedule_and_log(owner_id, schedule, attempt.clone(), now).await?;
                attempt
            }
            _ => {
                let mut next_day = self.get_schedule(owner_id, date.succ_opt().unwrap()).await?;
                match scheduler::bump_to_next_working_day(&mut schedule, &mut next_day, &self.window, block_id) {
                    Ok(to_interval) => {
                        let attempt = RescheduleAttempt {
                            id: Uuid::new_v4(),
                            block_id,
                            from_interval: schedule
                                .blocks
                                .iter()
                                .find(|b| b.id == block_id)
                                .map(|b| b.interval)
                                .unwrap_or(to_interval),
                            to_interval: Some(to_interval),
                            reason,
                            timestamp: now,
                        };
                        let uow = self.begin().await?;
                        uow.schedules().save(&schedule).await?;
                        uow.schedules().save(&next_day).await?;
                        uow.commit().await?;
                        self.reschedule_log.entry(owner_id).or_default().push(attempt.clone());
                        attempt
                    }
                    Err(_) => {
                        let from_interval = schedule
                            .blocks
                            .iter()
                            .find(|b| b.id == block_id)
                            .map(|b| b.interval)
                            .ok_or(KernelError::NotFound { aggregate: "Block", id: block_id.to_string() })?;
                        schedule.remove_block(block_id)?;
                        let attempt = RescheduleAttempt {
                            id: Uuid::new_v4(),
                            block_id,
                            from_interval,
                            to_interval: None,
                            reason,
                            timestamp: now,
                        };
                        let event = DomainEvent::BlockRemoved {
                            header: EventHeader {
                                aggregate_id: block_id,
                                aggregate_type: "Block".to_string(),
                                occurred_at: now,
                                routing_key: "block.removed".to_string(),
                            },
                            owner_id,
                            block_id,
                        };
                        let uow = self.begin().await?;
                        uow.schedules().save(&schedule).await?;
                        self.commit_with_outbox(uow, &event, now).await?;
                        self.reschedule_log.entry(owner_id).or_default().push(attempt.clone());
                        attempt
                    }
                }
            }
        };
        Ok(attempt)
    }

    /// `RescheduleBlock{blockId, newStart}` (spec §6): moves `block_id`
    /// to a caller-supplied start time, distinct from the automatic
    /// escalation in [`Self::reschedule_block`]. Rejects a target that
    /// overlaps another active block on its new day.
    pub async fn move_block_to(
        &self,
        owner_id: Uuid,
        date: NaiveDate,
        block_id: Uuid,
        new_start: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> ServiceResult<RescheduleAttempt> {
        self.entitlements.require(EntitlementModule::AutoRescheduler)?;
        let now = self.clock.now();
        let reason = reason.into();
        let mut schedule = self.get_schedule(owner_id, date).await?;
        let original = schedule
            .blocks
            .iter()
            .find(|b| b.id == block_id)
            .cloned()
            .ok_or(KernelError::NotFound { aggregate: "Block", id: block_id.to_string() })?;
        let from_interval = original.interval;
        let duration = chrono::Duration::minutes(from_interval.duration_minutes());
        let new_interval = Interval::new(new_start, new_start + duration)
            .map_err(|e| SchedulerError::InvalidInterval(e.to_string()))?;

        let new_date = new_start.date_naive();
        let mut target_schedule = if new_date == date {
            None
        } else {
            Some(self.get_schedule(owner_id, new_date).await?)
        };

        match target_schedule.as_mut() {
            // Same-day move: mutate the existing block in place rather
            // than remove+re-add, so it keeps occupying a single slot.
            None => {
                let conflicts = schedule.blocks.iter().any(|b| {
                    b.id != block_id
                        && b.state == orbita_kernel::domain::schedule::BlockState::Scheduled
                        && b.interval.overlaps(&new_interval)
                });
                if conflicts {
                    return Err(SchedulerError::Kernel(KernelError::Conflict(
                        "target interval overlaps an existing scheduled block".into(),
                    ))
                    .into());
                }
                schedule
                    .find_block_mut(block_id)
                    .expect("block_id was just found above")
                    .interval = new_interval;
            }
            // Cross-day move: soft-remove from the old day, insert fresh
            // into the new one (the same shape `bump_to_next_working_day`
            // uses for its own cross-day moves).
            Some(target) => {
                schedule.remove_block(block_id)?;
                let moved = Block {
                    id: block_id,
                    kind: original.kind,
                    source_id: original.source_id,
                    title: original.title,
                    interval: new_interval,
                    state: orbita_kernel::domain::schedule::BlockState::Scheduled,
                };
                target.add_block(moved).map_err(SchedulerError::Kernel)?;
            }
        }

        let attempt = RescheduleAttempt {
            id: Uuid::new_v4(),
            block_id,
            from_interval,
            to_interval: Some(new_interval),
            reason: reason.clone(),
            timestamp: now,
        };
        let event = DomainEvent::BlockRescheduled {
            header: EventHeader {
                aggregate_id: block_id,
                aggregate_type: "Block".to_string(),
                occurred_at: now,
                routing_key: "block.rescheduled".to_string(),
            },
            owner_id,
            block_id,
            reason,
        };

        let uow = self.begin().await?;
        uow.schedules().save(&schedule).await?;
        if let Some(target_schedule) = &target_schedule {
            uow.schedules().save(target_schedule).await?;
        }
        self.commit_with_outbox(uow, &event, now).await?;
        self.reschedule_log.entry(owner_id).or_default().push(attempt.clone());
        Ok(attempt)
    }

    async fn save_schedule_and_log(
        &self,
        owner_id: Uuid,
        schedule: Schedule,
        attempt: RescheduleAttempt,
        _now: DateTime<Utc>,
    ) -> KernelResult<()> {
        let uow = self.begin().await?;
        uow.schedules().save(&schedule).await?;
        uow.commit().await?;
        self.reschedule_log.entry(owner_id).or_default().push(attempt);
        Ok(())
    }

    pub fn list_reschedule_attempts(&self, owner_id: Uuid) -> Vec<RescheduleAttempt> {
        self.reschedule_log
            .get(&owner_id)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    /// Gated on `priority-engine`. Drains queued creations/removals for
    /// `owner_id` and places each against today's schedule.
    pub async fn auto_schedule(&self, owner_id: Uuid, date: NaiveDate) -> ServiceResult<Vec<PlacementOutcome>> {
        self.entitlements.require(EntitlementModule::PriorityEngine)?;
        self.place_pending(owner_id, date).await
    }

    async fn drain_pending_auto_schedule(&self, owner_id: Uuid) -> KernelResult<()> {
        let today = self.clock.now().date_naive();
        self.place_pending(owner_id, today).await.map_err(|e| match e {
            ServiceError::Kernel(k) => k,
            ServiceError::Scheduler(SchedulerError::Kernel(k)) => k,
            ServiceError::Scheduler(other) => KernelError::Conflict(other.to_string()),
        })?;
        Ok(())
    }

    async fn place_pending(&self, owner_id: Uuid, date: NaiveDate) -> ServiceResult<Vec<PlacementOutcome>> {
        let now = self.clock.now();
        let pending: Vec<_> = self
            .auto_scheduler
            .drain()
            .into_iter()
            .filter(|p| p.owner_id == owner_id)
            .collect();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut items = Vec::with_capacity(pending.len());
        let uow = self.begin().await?;
        for p in &pending {
            let (title, duration_minutes, priority, preferred_time) = match p.kind {
                BlockKind::Task => {
                    let Some(task) = uow.tasks().find_by_id(p.source_id).await? else { continue };
                    (task.title, task.estimated_minutes, task.priority, None)
                }
                BlockKind::Habit => {
                    let Some(habit) = uow.habits().find_by_id(p.source_id).await? else { continue };
                    (habit.name, habit.duration_minutes, Priority::Normal, Some(habit.preferred_time))
                }
                BlockKind::Meeting => {
                    let Some(meeting) = uow.meetings().find_by_id(p.source_id).await? else { continue };
                    (meeting.name, meeting.duration_minutes, Priority::High, None)
                }
                BlockKind::External => continue,
            };
            items.push(UnplacedItem {
                source_id: p.source_id.to_string(),
                kind: p.kind,
                title,
                duration_minutes,
                priority,
                anchor: None,
                preferred_time,
                created_at: now,
            });
        }

        let mut schedule = uow
            .schedules()
            .find_by_owner_and_date(owner_id, date)
            .await?
            .unwrap_or_else(|| Schedule::new(owner_id, date));
        let outcomes = scheduler::auto_schedule(&mut schedule, &self.window, items);
        uow.schedules().save(&schedule).await?;
        uow.commit().await?;

        for outcome in &outcomes {
            if let PlacementOutcome::Placed(block) = outcome {
                let event = DomainEvent::BlockScheduled {
                    header: EventHeader {
                        aggregate_id: block.id,
                        aggregate_type: "Block".to_string(),
                        occurred_at: now,
                        routing_key: "block.scheduled".to_string(),
                    },
                    owner_id,
                    schedule_date: date,
                    block_id: block.id,
                };
                self.bus.publish(&event);
            }
        }
        Ok(outcomes)
    }

    // ---- Calendar ----

    pub async fn sync_calendar(
        &self,
        coordinator: &CalendarSyncCoordinator,
        connection: &mut ConnectedCalendar,
        date: NaiveDate,
    ) -> Result<SyncReport, CalendarSyncError> {
        let now = self.clock.now();
        let owner_id = connection.owner_id;
        let mut schedule = self
            .get_schedule(owner_id, date)
            .await
            .map_err(SchedulerError::Kernel)?;
        let mut next_day = self
            .get_schedule(owner_id, date.succ_opt().unwrap())
            .await
            .map_err(SchedulerError::Kernel)?;
        let log = self.list_reschedule_attempts(owner_id);
        let report = coordinator
            .sync_once(connection, &mut schedule, &mut next_day, &log, &self.window, now)
            .await?;
        let uow = self.begin().await.map_err(SchedulerError::Kernel)?;
        uow.schedules().save(&schedule).await.map_err(SchedulerError::Kernel)?;
        uow.schedules().save(&next_day).await.map_err(SchedulerError::Kernel)?;
        uow.commit().await.map_err(SchedulerError::Kernel)?;
        for attempt in &report.rescheduled {
            self.reschedule_log.entry(owner_id).or_default().push(attempt.clone());
        }
        Ok(report)
    }

    // ---- License ----

    pub async fn activate_license(&self, owner_id: Uuid, license: License) -> KernelResult<()> {
        let plan = license.plan.clone().unwrap_or_default();
        self.entitlements.activate(license)?;
        let now = self.clock.now();
        self.bus.publish(&DomainEvent::LicenseActivated {
            header: EventHeader {
                aggregate_id: owner_id,
                aggregate_type: "License".to_string(),
                occurred_at: now,
                routing_key: "license.activated".to_string(),
            },
            owner_id,
            plan,
        });
        Ok(())
    }

    pub async fn deactivate_license(&self, owner_id: Uuid) -> KernelResult<()> {
        self.entitlements.deactivate()?;
        let now = self.clock.now();
        self.bus.publish(&DomainEvent::LicenseDeactivated {
            header: EventHeader {
                aggregate_id: owner_id,
                aggregate_type: "License".to_string(),
                occurred_at: now,
                routing_key: "license.deactivated".to_string(),
            },
            owner_id,
        });
        Ok(())
    }

    pub fn license_status(&self) -> orbita_kernel::domain::license::LicenseStatus {
        self.entitlements.status()
    }
}
