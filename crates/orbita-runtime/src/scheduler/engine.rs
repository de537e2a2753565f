//! Slot search and placement (spec §4.1): anchor-first, then preferred
//! time of day, then earliest free interval.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use orbita_kernel::domain::habit::PreferredTime;
use orbita_kernel::domain::schedule::{Block, BlockKind, Interval, Schedule};
use orbita_kernel::domain::task::Priority;

use super::{free_intervals, SchedulerError, UnplacedItem};

/// The recurring working window: the days of the week and the
/// start/end time of day within which blocks may be placed. Weekday
/// indices are Monday = 0 .. Sunday = 6, matching `chrono::Weekday`.
#[derive(Debug, Clone)]
pub struct WorkingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub weekday_mask: [bool; 7],
}

impl Default for WorkingWindow {
    /// 09:00–18:00, Monday through Friday — SPEC_FULL.md §C default.
    fn default() -> Self {
        WorkingWindow {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            weekday_mask: [true, true, true, true, true, false, false],
        }
    }
}

impl WorkingWindow {
    /// The working interval for `date`, or `None` when `date` falls
    /// outside the configured weekday mask.
    pub fn instants_for(&self, date: NaiveDate) -> Option<Interval> {
        if !self.weekday_mask[date.weekday().num_days_from_monday() as usize] {
            return None;
        }
        let start = Utc.from_utc_datetime(&date.and_time(self.start));
        let end = Utc.from_utc_datetime(&date.and_time(self.end));
        Interval::new(start, end).ok()
    }
}

/// A caller-supplied request to place one item on one day.
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub kind: BlockKind,
    pub source_id: String,
    pub title: String,
    pub duration_minutes: u32,
    /// An exact requested start instant, tried first if present.
    pub anchor: Option<DateTime<Utc>>,
    pub preferred_time: Option<PreferredTime>,
}

/// Find a free slot of `duration_minutes` on `schedule`'s date,
/// honoring the anchor → preferred-time → earliest-free order, without
/// mutating the schedule.
pub fn find_slot(
    schedule: &Schedule,
    window: &WorkingWindow,
    duration_minutes: u32,
    anchor: Option<DateTime<Utc>>,
    preferred_time: Option<PreferredTime>,
) -> Result<Interval, SchedulerError> {
    if duration_minutes == 0 {
        return Err(SchedulerError::InvalidInterval(
            "duration must be at least one minute".into(),
        ));
    }
    let duration = chrono::Duration::minutes(duration_minutes as i64);
    let free = free_intervals(schedule, window);

    let fits = |candidate: &Interval| -> bool {
        free.iter()
            .any(|f| f.start <= candidate.start && candidate.end <= f.end)
    };

    if let Some(anchor) = anchor {
        let candidate = Interval {
            start: anchor,
            end: anchor + duration,
        };
        if fits(&candidate) {
            return Ok(candidate);
        }
    }

    if let Some(pref) = preferred_time {
        let hour = pref.default_hour();
        let candidate_start = Utc.from_utc_datetime(
            &schedule
                .date
                .and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap()),
        );
        let candidate = Interval {
            start: candidate_start,
            end: candidate_start + duration,
        };
        if fits(&candidate) {
            return Ok(candidate);
        }
    }

    free.into_iter()
        .find(|f| f.duration_minutes() >= duration_minutes as i64)
        .map(|f| Interval {
            start: f.start,
            end: f.start + duration,
        })
        .ok_or(SchedulerError::NoSlotAvailable)
}

/// Find a slot for `request` and append the resulting block to
/// `schedule`. The caller is responsible for persisting the mutated
/// schedule and emitting `BlockScheduled`.
pub fn place(
    schedule: &mut Schedule,
    window: &WorkingWindow,
    request: PlacementRequest,
) -> Result<Block, SchedulerError> {
    let interval = find_slot(
        schedule,
        window,
        request.duration_minutes,
        request.anchor,
        request.preferred_time,
    )?;
    let block = Block::new(request.kind, request.source_id, request.title, interval);
    schedule
        .add_block(block.clone())
        .map_err(|_| SchedulerError::ConflictIrresolvable)?;
    Ok(block)
}

/// Batch placement for `AutoSchedule` (spec §4.2): items are ordered by
/// priority descending, then duration descending, then creation time
/// ascending, and placed one at a time against the same mutating
/// schedule so later items see earlier placements.
pub fn auto_schedule(
    schedule: &mut Schedule,
    window: &WorkingWindow,
    mut items: Vec<UnplacedItem>,
) -> Vec<super::PlacementOutcome> {
    items.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(b.duration_minutes.cmp(&a.duration_minutes))
            .then(a.created_at.cmp(&b.created_at))
    });

    items
        .into_iter()
        .map(|item| {
            let request = PlacementRequest {
                kind: item.kind,
                source_id: item.source_id.clone(),
                title: item.title,
                duration_minutes: item.duration_minutes,
                anchor: item.anchor,
                preferred_time: item.preferred_time,
            };
            match place(schedule, window, request) {
                Ok(block) => super::PlacementOutcome::Placed(block),
                Err(error) => super::PlacementOutcome::Failed {
                    source_id: item.source_id,
                    error,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use orbita_kernel::domain::schedule::Interval as Iv;
    use uuid::Uuid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 26).unwrap() // Monday
    }

    #[test]
    fn places_anchor_when_free() {
        let window = WorkingWindow::default();
        let mut schedule = Schedule::new(Uuid::new_v4(), date());
        let anchor = window.instants_for(date()).unwrap().start + chrono::Duration::hours(1);
        let request = PlacementRequest {
            kind: BlockKind::Task,
            source_id: "t1".into(),
            title: "Write report".into(),
            duration_minutes: 30,
            anchor: Some(anchor),
            preferred_time: None,
        };
        let block = place(&mut schedule, &window, request).unwrap();
        assert_eq!(block.interval.start, anchor);
    }

    #[test]
    fn falls_back_to_preferred_time_when_anchor_busy() {
        let window = WorkingWindow::default();
        let mut schedule = Schedule::new(Uuid::new_v4(), date());
        let morning_start = window.instants_for(date()).unwrap().start;
        schedule
            .add_block(orbita_kernel::domain::schedule::Block::new(
                BlockKind::Meeting,
                "m1",
                "Standup",
                Iv::new(morning_start, morning_start + chrono::Duration::hours(2)).unwrap(),
            ))
            .unwrap();

        let request = PlacementRequest {
            kind: BlockKind::Habit,
            source_id: "h1".into(),
            title: "Meditate".into(),
            duration_minutes: 20,
            anchor: Some(morning_start),
            preferred_time: Some(PreferredTime::Afternoon),
        };
        let block = place(&mut schedule, &window, request).unwrap();
        assert_eq!(block.interval.start.time().hour(), 14);
    }

    #[test]
    fn returns_no_slot_when_window_is_full() {
        let window = WorkingWindow::default();
        let mut schedule = Schedule::new(Uuid::new_v4(), date());
        let day = window.instants_for(date()).unwrap();
        schedule
            .add_block(orbita_kernel::domain::schedule::Block::new(
                BlockKind::Task,
                "t1",
                "All day",
                day,
            ))
            .unwrap();

        let request = PlacementRequest {
            kind: BlockKind::Task,
            source_id: "t2".into(),
            title: "Anything".into(),
            duration_minutes: 15,
            anchor: None,
            preferred_time: None,
        };
        let err = place(&mut schedule, &window, request).unwrap_err();
        assert_eq!(err, SchedulerError::NoSlotAvailable);
    }

    #[test]
    fn auto_schedule_places_higher_priority_first_when_contending_for_one_slot() {
        let window = WorkingWindow::default();
        let mut schedule = Schedule::new(Uuid::new_v4(), date());
        let day = window.instants_for(date()).unwrap();
        // Leave exactly one hour free at the start of the day.
        schedule
            .add_block(orbita_kernel::domain::schedule::Block::new(
                BlockKind::Task,
                "filler",
                "Filler",
                Iv::new(day.start + chrono::Duration::hours(1), day.end).unwrap(),
            ))
            .unwrap();

        let now = Utc::now();
        let items = vec![
            UnplacedItem {
                source_id: "low".into(),
                kind: BlockKind::Task,
                title: "Low priority".into(),
                duration_minutes: 60,
                priority: Priority::Low,
                anchor: None,
                preferred_time: None,
                created_at: now,
            },
            UnplacedItem {
                source_id: "urgent".into(),
                kind: BlockKind::Task,
                title: "Urgent".into(),
                duration_minutes: 60,
                priority: Priority::Urgent,
                anchor: None,
                preferred_time: None,
                created_at: now,
            },
        ];

        let outcomes = auto_schedule(&mut schedule, &window, items);
        assert!(matches!(outcomes[0], super::super::PlacementOutcome::Placed(_)));
        assert!(matches!(
            outcomes[1],
            super::super::PlacementOutcome::Failed { .. }
        ));
        if let super::super::PlacementOutcome::Placed(block) = &outcomes[0] {
            assert_eq!(block.source_id, "urgent");
        }
    }
}
