//! Auto-reschedule: when a block can no longer hold its slot (an
//! external calendar import collided with it, or a caller asked to move
//! it), try up to three strategies before giving up (SPEC_FULL.md §C).

use chrono::{TimeZone, Utc};
use orbita_kernel::domain::schedule::{Interval, RescheduleAttempt, Schedule};
use uuid::Uuid;

use super::engine::{find_slot, WorkingWindow};
use super::SchedulerError;

/// Per-block daily attempt cap (spec §8 scenario-driven; a block that
/// has already been bumped three times today is left in place).
pub const MAX_ATTEMPTS_PER_DAY: usize = 3;

/// Count prior reschedule attempts recorded for `block_id` on
/// `schedule.date`.
pub fn attempts_today(log: &[RescheduleAttempt], block_id: Uuid, schedule: &Schedule) -> usize {
    log.iter()
        .filter(|a| a.block_id == block_id && a.timestamp.date_naive() == schedule.date)
        .count()
}

/// Try, within `schedule`'s own day: shift later, then shift earlier.
/// Returns the resolved interval, or `Ok(None)` if neither fits and the
/// caller should fall back to [`bump_to_next_working_day`] against the
/// following day's `Schedule`.
fn shift_within_day(
    schedule: &Schedule,
    window: &WorkingWindow,
    from_interval: Interval,
    duration_minutes: u32,
) -> Option<Interval> {
    find_slot(schedule, window, duration_minutes, Some(from_interval.end), None)
        .or_else(|_| {
            find_slot(
                schedule,
                window,
                duration_minutes,
                Some(from_interval.start - chrono::Duration::minutes(duration_minutes as i64)),
                None,
            )
        })
        .ok()
}

/// Third strategy: place the block on the next working day's schedule
/// at the same time of day, falling back to that day's earliest free
/// slot. Returns the block removed from `schedule` and re-added to
/// `next_day_schedule` on success.
pub fn bump_to_next_working_day(
    schedule: &mut Schedule,
    next_day_schedule: &mut Schedule,
    window: &WorkingWindow,
    block_id: Uuid,
) -> Result<Interval, SchedulerError> {
    let block = schedule
        .blocks
        .iter()
        .find(|b| b.id == block_id)
        .cloned()
        .ok_or(SchedulerError::ConflictIrresolvable)?;
    let duration_minutes = block.interval.duration_minutes() as u32;
    let same_time_tomorrow = next_day_schedule
        .date
        .and_time(block.interval.start.time());
    let anchor = Utc.from_utc_datetime(&same_time_tomorrow);

    let interval = find_slot(next_day_schedule, window, duration_minutes, Some(anchor), None)
        .or_else(|_| find_slot(next_day_schedule, window, duration_minutes, None, None))?;

    schedule.remove_block(block_id)?;
    let mut moved = block;
    moved.interval = interval;
    next_day_schedule
        .add_block(moved)
        .map_err(|_| SchedulerError::ConflictIrresolvable)?;
    Ok(interval)
}

/// Attempt the in-day strategies (shift later, shift earlier) for
/// `block_id`. Returns `Ok(attempt)` recording the outcome; a
/// `to_interval` of `None` means both in-day strategies failed and the
/// caller should try [`bump_to_next_working_day`] next.
pub fn auto_reschedule(
    schedule: &mut Schedule,
    window: &WorkingWindow,
    log: &[RescheduleAttempt],
    block_id: Uuid,
    reason: impl Into<String>,
    now: chrono::DateTime<Utc>,
) -> Result<RescheduleAttempt, SchedulerError> {
    let reason = reason.into();
    if attempts_today(log, block_id, schedule) >= MAX_ATTEMPTS_PER_DAY {
        return Err(SchedulerError::ConflictIrresolvable);
    }

    let block = schedule
        .blocks
        .iter()
        .find(|b| b.id == block_id)
        .ok_or(SchedulerError::ConflictIrresolvable)?
        .clone();
    let from_interval = block.interval;
    let duration_minutes = from_interval.duration_minutes() as u32;

    let resolved = shift_within_day(schedule, window, from_interval, duration_minutes);

    if let Some(interval) = resolved {
        schedule
            .find_block_mut(block_id)
            .ok_or(SchedulerError::ConflictIrresolvable)?
            .interval = interval;
    }

    Ok(RescheduleAttempt {
        id: Uuid::new_v4(),
        block_id,
        from_interval,
        to_interval: resolved,
        reason,
        timestamp: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use orbita_kernel::domain::schedule::{Block, BlockKind};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 26).unwrap()
    }

    #[test]
    fn shifts_later_when_room_remains() {
        let window = WorkingWindow::default();
        let mut schedule = Schedule::new(Uuid::new_v4(), date());
        let day = window.instants_for(date()).unwrap();
        let block = Block::new(
            BlockKind::Task,
            "t1",
            "T1",
            Interval::new(day.start, day.start + chrono::Duration::hours(1)).unwrap(),
        );
        let block_id = block.id;
        schedule.add_block(block).unwrap();

        let collider = Block::new(
            BlockKind::External,
            "ext1",
            "Imported event",
            Interval::new(day.start, day.start + chrono::Duration::minutes(30)).unwrap(),
        );
        // Simulate the external collision by removing the original slot
        // and re-adding the colliding event, then asking to reschedule.
        schedule.remove_block(block_id).unwrap();
        schedule.add_block(collider).unwrap();
        let mut block_back = Block::new(
            BlockKind::Task,
            "t1",
            "T1",
            Interval::new(day.start, day.start + chrono::Duration::hours(1)).unwrap(),
        );
        block_back.id = block_id;
        schedule.blocks.push(block_back);

        let now = Utc.with_ymd_and_hms(2026, 1, 26, 8, 0, 0).unwrap();
        let attempt =
            auto_reschedule(&mut schedule, &window, &[], block_id, "external collision", now)
                .unwrap();
        assert!(attempt.to_interval.is_some());
        assert!(schedule.check_invariant());
    }

    #[test]
    fn exhausted_attempts_today_are_rejected() {
        let window = WorkingWindow::default();
        let schedule = Schedule::new(Uuid::new_v4(), date());
        let block_id = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2026, 1, 26, 8, 0, 0).unwrap();
        let log: Vec<RescheduleAttempt> = (0..MAX_ATTEMPTS_PER_DAY)
            .map(|_| RescheduleAttempt {
                id: Uuid::new_v4(),
                block_id,
                from_interval: window.instants_for(date()).unwrap(),
                to_interval: None,
                reason: "prior attempt".into(),
                timestamp: now,
            })
            .collect();
        assert_eq!(attempts_today(&log, block_id, &schedule), MAX_ATTEMPTS_PER_DAY);

        let mut schedule = schedule;
        let err = auto_reschedule(&mut schedule, &window, &log, block_id, "again", now)
            .unwrap_err();
        assert_eq!(err, SchedulerError::ConflictIrresolvable);
    }

    #[test]
    fn bumps_to_next_day_when_today_is_completely_full() {
        let window = WorkingWindow::default();
        let owner = Uuid::new_v4();
        let mut today = Schedule::new(owner, date());
        let mut tomorrow = Schedule::new(owner, date().succ_opt().unwrap());
        let day = window.instants_for(date()).unwrap();

        let block = Block::new(BlockKind::Task, "t1", "T1", day);
        let block_id = block.id;
        today.add_block(block).unwrap();

        let interval = bump_to_next_working_day(&mut today, &mut tomorrow, &window, block_id)
            .unwrap();
        assert!(!today.active_blocks().iter().any(|b| b.id == block_id));
        assert!(tomorrow.active_blocks().iter().any(|b| b.id == block_id));
        assert_eq!(interval.duration_minutes(), day.duration_minutes());
    }
}
