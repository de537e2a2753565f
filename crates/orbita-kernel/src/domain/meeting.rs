//! Recurring 1:1 meeting aggregate.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{DomainEvent, EventHeader};
use crate::error::{KernelError, KernelResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Weekly,
    Biweekly,
    Monthly,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub cadence: Cadence,
    pub cadence_days: u32,
    pub duration_minutes: u32,
    /// Duration since midnight, owner-local.
    pub preferred_time_of_day: Duration,
    pub last_held_at: Option<DateTime<Utc>>,
    pub archived: bool,
}

impl Meeting {
    pub fn create(
        owner_id: Uuid,
        name: impl Into<String>,
        cadence: Cadence,
        cadence_days: u32,
        duration_minutes: u32,
        preferred_time_of_day: Duration,
        now: DateTime<Utc>,
    ) -> KernelResult<(Self, DomainEvent)> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(KernelError::Validation(
                "meeting name must not be empty".into(),
            ));
        }
        if cadence_days == 0 {
            return Err(KernelError::Validation(
                "cadenceDays must be a positive integer".into(),
            ));
        }
        if duration_minutes < 1 {
            return Err(KernelError::Validation(
                "meeting duration must be >= 1 minute".into(),
            ));
        }
        let id = Uuid::new_v4();
        let meeting = Meeting {
            id,
            owner_id,
            name: name.clone(),
            cadence,
            cadence_days,
            duration_minutes,
            preferred_time_of_day,
            last_held_at: None,
            archived: false,
        };
        let event = DomainEvent::MeetingCreated {
            header: EventHeader {
                aggregate_id: id,
                aggregate_type: "Meeting".to_string(),
                occurred_at: now,
                routing_key: "meeting.created".to_string(),
            },
            owner_id,
            name,
        };
        Ok((meeting, event))
    }

    fn assert_owner(&self, caller: Uuid) -> KernelResult<()> {
        if self.owner_id != caller {
            return Err(KernelError::NotOwner {
                aggregate: "Meeting",
                id: self.id.to_string(),
            });
        }
        Ok(())
    }

    /// A meeting is a candidate on `day` if it has never been held, or the
    /// elapsed days since it was last held meet or exceed `cadence_days`.
    pub fn is_candidate_on(&self, day: DateTime<Utc>) -> bool {
        if self.archived {
            return false;
        }
        match self.last_held_at {
            None => true,
            Some(last) => (day.date_naive() - last.date_naive()).num_days() >= self.cadence_days as i64,
        }
    }

    pub fn mark_held(
        &mut self,
        caller: Uuid,
        held_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> KernelResult<DomainEvent> {
        self.assert_owner(caller)?;
        if self.archived {
            return Err(KernelError::Conflict(format!(
                "meeting {} is archived",
                self.id
            )));
        }
        self.last_held_at = Some(held_at);
        Ok(DomainEvent::MeetingHeld {
            header: EventHeader {
                aggregate_id: self.id,
                aggregate_type: "Meeting".to_string(),
                occurred_at: now,
                routing_key: "meeting.held".to_string(),
            },
            owner_id: self.owner_id,
            held_at,
        })
    }

    pub fn adjust_cadence(&mut self, caller: Uuid, new_cadence_days: u32) -> KernelResult<()> {
        self.assert_owner(caller)?;
        if new_cadence_days == 0 {
            return Err(KernelError::Validation(
                "cadenceDays must be a positive integer".into(),
            ));
        }
        self.cadence_days = new_cadence_days;
        Ok(())
    }

    pub fn archive(&mut self, caller: Uuid) -> KernelResult<()> {
        self.assert_owner(caller)?;
        self.archived = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    #[test]
    fn never_held_meeting_is_always_a_candidate() {
        let owner = Uuid::new_v4();
        let (meeting, _) = Meeting::create(
            owner,
            "1:1 with Sam",
            Cadence::Weekly,
            7,
            30,
            Duration::hours(10),
            at(2026, 1, 1),
        )
        .unwrap();
        assert!(meeting.is_candidate_on(at(2026, 6, 1)));
    }

    #[test]
    fn candidate_only_after_cadence_elapses() {
        let owner = Uuid::new_v4();
        let (mut meeting, _) = Meeting::create(
            owner,
            "1:1 with Sam",
            Cadence::Weekly,
            7,
            30,
            Duration::hours(10),
            at(2026, 1, 1),
        )
        .unwrap();
        meeting.mark_held(owner, at(2026, 1, 5), at(2026, 1, 5)).unwrap();
        assert!(!meeting.is_candidate_on(at(2026, 1, 10)));
        assert!(meeting.is_candidate_on(at(2026, 1, 12)));
    }
}
