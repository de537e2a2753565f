//! Habit aggregate: frequency, preferred time-of-day, and completion
//! history with streak bookkeeping.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{DomainEvent, EventHeader};
use crate::error::{KernelError, KernelResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekdays,
    Weekends,
    Weekly,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredTime {
    Morning,
    Afternoon,
    Evening,
    Night,
    Anytime,
}

impl PreferredTime {
    /// Default clock hour used when no completion history exists yet.
    pub fn default_hour(self) -> u32 {
        match self {
            PreferredTime::Morning => 9,
            PreferredTime::Afternoon => 14,
            PreferredTime::Evening => 19,
            PreferredTime::Night => 22,
            PreferredTime::Anytime => 9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitCompletion {
    pub id: Uuid,
    pub habit_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub times_per_week: u8,
    pub duration_minutes: u32,
    pub preferred_time: PreferredTime,
    pub current_streak: u32,
    pub best_streak: u32,
    pub total_done: u32,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completions: Vec<HabitCompletion>,
}

impl Habit {
    pub fn create(
        owner_id: Uuid,
        name: impl Into<String>,
        description: Option<String>,
        frequency: Frequency,
        times_per_week: u8,
        duration_minutes: u32,
        preferred_time: PreferredTime,
        now: DateTime<Utc>,
    ) -> KernelResult<(Self, DomainEvent)> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(KernelError::Validation("habit name must not be empty".into()));
        }
        if duration_minutes < 1 {
            return Err(KernelError::Validation(
                "habit duration must be >= 1 minute".into(),
            ));
        }
        if !(1..=7).contains(&times_per_week) {
            return Err(KernelError::Validation(
                "timesPerWeek must be between 1 and 7".into(),
            ));
        }
        let id = Uuid::new_v4();
        let habit = Habit {
            id,
            owner_id,
            name: name.clone(),
            description,
            frequency,
            times_per_week,
            duration_minutes,
            preferred_time,
            current_streak: 0,
            best_streak: 0,
            total_done: 0,
            archived: false,
            created_at: now,
            updated_at: now,
            completions: Vec::new(),
        };
        let event = DomainEvent::HabitCreated {
            header: EventHeader {
                aggregate_id: id,
                aggregate_type: "Habit".to_string(),
                occurred_at: now,
                routing_key: "habit.created".to_string(),
            },
            owner_id,
            name,
        };
        Ok((habit, event))
    }

    fn assert_owner(&self, caller: Uuid) -> KernelResult<()> {
        if self.owner_id != caller {
            return Err(KernelError::NotOwner {
                aggregate: "Habit",
                id: self.id.to_string(),
            });
        }
        Ok(())
    }

    /// Whether the habit calls for an occurrence on `date`. Always `false`
    /// once archived.
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        if self.archived {
            return false;
        }
        self.is_due_on_unchecked(date)
    }

    /// Due-day rule ignoring the archived flag; used internally to search
    /// for "the previous due day" without short-circuiting on the current
    /// (not-yet-mutated) archived state.
    fn is_due_on_unchecked(&self, date: NaiveDate) -> bool {
        match self.frequency {
            Frequency::Daily => true,
            Frequency::Weekdays => date.weekday().num_days_from_monday() < 5,
            Frequency::Weekends => date.weekday().num_days_from_monday() >= 5,
            Frequency::Weekly => {
                let anchor = self.created_at.date_naive();
                (date - anchor).num_days().rem_euclid(7) == 0
            }
            Frequency::Custom => {
                (date.weekday().num_days_from_monday() as u8) < self.times_per_week
            }
        }
    }

    /// The latest due day strictly before `date`, searched back up to one
    /// year. Returns `None` if none is found (degenerate configuration).
    fn previous_due_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut d = date.pred_opt()?;
        for _ in 0..366 {
            if self.is_due_on_unchecked(d) {
                return Some(d);
            }
            d = d.pred_opt()?;
        }
        None
    }

    fn day_of(instant: DateTime<Utc>) -> NaiveDate {
        instant.date_naive()
    }

    /// Log a completion at `completed_at`. Rejects archived habits and a
    /// second completion on the same calendar day.
    pub fn log_completion(
        &mut self,
        caller: Uuid,
        completed_at: DateTime<Utc>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> KernelResult<DomainEvent> {
        self.assert_owner(caller)?;
        if self.archived {
            return Err(KernelError::Conflict(format!(
                "habit {} is archived",
                self.id
            )));
        }
        let day = Self::day_of(completed_at);
        if self
            .completions
            .iter()
            .any(|c| Self::day_of(c.completed_at) == day)
        {
            return Err(KernelError::Conflict("habit already logged today".into()));
        }

        let prev_due = self.previous_due_day(day);
        let continues_streak = match self.completions.last() {
            Some(last) => Some(Self::day_of(last.completed_at)) == prev_due,
            None => false,
        };
        self.current_streak = if continues_streak {
            self.current_streak + 1
        } else {
            1
        };
        self.best_streak = self.best_streak.max(self.current_streak);
        self.total_done += 1;
        self.completions.push(HabitCompletion {
            id: Uuid::new_v4(),
            habit_id: self.id,
            completed_at,
            notes,
        });
        self.updated_at = now;

        Ok(DomainEvent::HabitCompleted {
            header: EventHeader {
                aggregate_id: self.id,
                aggregate_type: "Habit".to_string(),
                occurred_at: now,
                routing_key: "habit.completed".to_string(),
            },
            owner_id: self.owner_id,
            streak: self.current_streak,
            total_done: self.total_done,
        })
    }

    pub fn archive(&mut self, caller: Uuid, now: DateTime<Utc>) -> KernelResult<DomainEvent> {
        self.assert_owner(caller)?;
        if self.archived {
            return Err(KernelError::Conflict(format!(
                "habit {} is already archived",
                self.id
            )));
        }
        self.archived = true;
        self.updated_at = now;
        Ok(DomainEvent::HabitArchived {
            header: EventHeader {
                aggregate_id: self.id,
                aggregate_type: "Habit".to_string(),
                occurred_at: now,
                routing_key: "habit.archived".to_string(),
            },
            owner_id: self.owner_id,
        })
    }

    /// Apply an adaptive-frequency adjustment computed by the habit
    /// learner, converting the habit to `custom` with the new weekly
    /// target. No-op adjustments should not be passed in by the caller.
    pub fn apply_frequency_change(
        &mut self,
        caller: Uuid,
        new_times_per_week: u8,
        now: DateTime<Utc>,
    ) -> KernelResult<DomainEvent> {
        self.assert_owner(caller)?;
        if self.archived {
            return Err(KernelError::Conflict(format!(
                "habit {} is archived",
                self.id
            )));
        }
        let old = self.times_per_week;
        self.frequency = Frequency::Custom;
        self.times_per_week = new_times_per_week;
        self.updated_at = now;
        Ok(DomainEvent::HabitFrequencyChanged {
            header: EventHeader {
                aggregate_id: self.id,
                aggregate_type: "Habit".to_string(),
                occurred_at: now,
                routing_key: "habit.frequency_changed".to_string(),
            },
            owner_id: self.owner_id,
            old_times_per_week: old,
            new_times_per_week,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn daily_habit_streak_builds_across_consecutive_days() {
        let owner = Uuid::new_v4();
        let (mut habit, _) = Habit::create(
            owner,
            "meditate",
            None,
            Frequency::Daily,
            7,
            30,
            PreferredTime::Morning,
            at(2026, 1, 21, 9),
        )
        .unwrap();

        habit
            .log_completion(owner, at(2026, 1, 22, 9), None, at(2026, 1, 22, 9))
            .unwrap();
        assert_eq!(habit.current_streak, 1);

        habit
            .log_completion(owner, at(2026, 1, 23, 9), None, at(2026, 1, 23, 9))
            .unwrap();
        assert_eq!(habit.current_streak, 2);
        assert_eq!(habit.best_streak, 2);
        assert_eq!(habit.total_done, 2);

        let err = habit
            .log_completion(owner, at(2026, 1, 23, 10), None, at(2026, 1, 23, 10))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
    }

    #[test]
    fn skipping_a_due_day_resets_streak() {
        let owner = Uuid::new_v4();
        let (mut habit, _) = Habit::create(
            owner,
            "run",
            None,
            Frequency::Daily,
            7,
            30,
            PreferredTime::Morning,
            at(2026, 1, 1, 9),
        )
        .unwrap();
        habit
            .log_completion(owner, at(2026, 1, 2, 9), None, at(2026, 1, 2, 9))
            .unwrap();
        habit
            .log_completion(owner, at(2026, 1, 4, 9), None, at(2026, 1, 4, 9))
            .unwrap();
        assert_eq!(habit.current_streak, 1);
        assert_eq!(habit.best_streak, 1);
    }

    #[test]
    fn archived_habit_is_never_due() {
        let owner = Uuid::new_v4();
        let (mut habit, _) = Habit::create(
            owner,
            "journal",
            None,
            Frequency::Daily,
            7,
            10,
            PreferredTime::Evening,
            at(2026, 1, 1, 9),
        )
        .unwrap();
        assert!(habit.is_due_on(at(2026, 1, 2, 0).date_naive()));
        habit.archive(owner, at(2026, 1, 2, 0)).unwrap();
        assert!(!habit.is_due_on(at(2026, 1, 3, 0).date_naive()));
    }

    #[test]
    fn archived_habit_rejects_completions() {
        let owner = Uuid::new_v4();
        let (mut habit, _) = Habit::create(
            owner,
            "journal",
            None,
            Frequency::Daily,
            7,
            10,
            PreferredTime::Evening,
            at(2026, 1, 1, 9),
        )
        .unwrap();
        habit.archive(owner, at(2026, 1, 2, 0)).unwrap();
        let err = habit
            .log_completion(owner, at(2026, 1, 3, 9), None, at(2026, 1, 3, 9))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
    }
}
