//! Conflict resolution between an imported external event and the
//! existing schedule (spec §4.4 / §8 scenario 3).

use chrono::{DateTime, Utc};
use orbita_kernel::domain::schedule::{Block, BlockKind, BlockState, RescheduleAttempt, Schedule};
use uuid::Uuid;

use crate::scheduler::{auto_reschedule, bump_to_next_working_day, SchedulerError, WorkingWindow};

use super::provider::ExternalEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    ExternalWins,
    InternalWins,
    Manual,
}

/// What happened when importing one external event.
#[derive(Debug)]
pub enum ImportOutcome {
    /// No conflict: the external event was inserted as-is.
    Inserted(Block),
    /// The conflicting internal block was bumped (later in the day, or
    /// to the next working day) and the external event inserted in its
    /// place.
    Rescheduled {
        moved_block_id: Uuid,
        attempt: RescheduleAttempt,
        inserted: Block,
    },
    /// `ExternalWins`, but every reschedule strategy was exhausted: the
    /// conflicting internal block was removed (state=Removed) to make
    /// room for the external event.
    Removed {
        removed_block_id: Uuid,
        attempt: RescheduleAttempt,
        inserted: Block,
    },
    /// `InternalWins`: the external event was dropped, nothing changed.
    SkippedInternalWins,
    /// The event overlaps a block that's already `Completed`; completed
    /// history is never displaced, so the import is a no-op.
    SkippedCompleted,
    /// `Manual`: left for the caller to resolve; nothing changed.
    NeedsManualResolution,
    /// Already imported in a prior sync (same `external_id` already
    /// present as an active block) — re-importing is a no-op.
    AlreadyImported,
}

/// Imports `event` into `schedule` under `strategy`. Idempotent by
/// `external_id`: an event already present as an active External block
/// is not re-inserted or re-conflicted. `next_day_schedule` and `log`
/// back the `ExternalWins` escalation path (§4.1's shift/bump ladder)
/// and are unused by the other strategies.
pub fn import_event(
    schedule: &mut Schedule,
    next_day_schedule: &mut Schedule,
    window: &WorkingWindow,
    log: &[RescheduleAttempt],
    event: &ExternalEvent,
    strategy: ConflictStrategy,
    now: DateTime<Utc>,
) -> Result<ImportOutcome, SchedulerError> {
    if schedule.active_blocks().iter().any(|b| {
        b.kind == BlockKind::External && b.source_id == event.external_id
    }) {
        return Ok(ImportOutcome::AlreadyImported);
    }

    if schedule.active_blocks().iter().any(|b| {
        b.state == BlockState::Completed && b.interval.overlaps(&event.interval)
    }) {
        tracing::info!(
            external_id = %event.external_id,
            "external event overlaps a completed block, leaving it in place"
        );
        return Ok(ImportOutcome::SkippedCompleted);
    }

    let conflicting = schedule
        .active_blocks()
        .into_iter()
        .find(|b| b.state == BlockState::Scheduled && b.interval.overlaps(&event.interval))
        .map(|b| b.id);

    let Some(conflicting_id) = conflicting else {
        let block = Block::new(
            BlockKind::External,
            event.external_id.clone(),
            event.title.clone(),
            event.interval,
        );
        schedule
            .add_block(block.clone())
            .map_err(SchedulerError::Kernel)?;
        return Ok(ImportOutcome::Inserted(block));
    };

    match strategy {
        ConflictStrategy::InternalWins => Ok(ImportOutcome::SkippedInternalWins),
        ConflictStrategy::Manual => Ok(ImportOutcome::NeedsManualResolution),
        ConflictStrategy::ExternalWins => {
            // Free the conflicting slot first so the external event (and
            // the in-day search below) never collides with it while we
            // decide where the internal block ends up.
            schedule
                .remove_block(conflicting_id)
                .map_err(SchedulerError::Kernel)?;

            let external_block = Block::new(
                BlockKind::External,
                event.external_id.clone(),
                event.title.clone(),
                event.interval,
            );
            schedule
                .add_block(external_block.clone())
                .map_err(SchedulerError::Kernel)?;

            let reason = format!("bumped by imported external event '{}'", event.external_id);
            let attempt = auto_reschedule(schedule, window, log, conflicting_id, reason.clone(), now)?;

            if attempt.to_interval.is_some() {
                schedule
                    .find_block_mut(conflicting_id)
                    .expect("auto_reschedule resolved the block in place")
                    .state = BlockState::Scheduled;
                return Ok(ImportOutcome::Rescheduled {
                    moved_block_id: conflicting_id,
                    attempt,
                    inserted: external_block,
                });
            }

            match bump_to_next_working_day(schedule, next_day_schedule, window, conflicting_id) {
                Ok(interval) => {
                    next_day_schedule
                        .find_block_mut(conflicting_id)
                        .expect("bump_to_next_working_day placed the block")
                        .state = BlockState::Scheduled;
                    let bumped = RescheduleAttempt {
                        id: Uuid::new_v4(),
                        block_id: conflicting_id,
                        from_interval: attempt.from_interval,
                        to_interval: Some(interval),
                        reason,
                        timestamp: now,
                    };
                    Ok(ImportOutcome::Rescheduled {
                        moved_block_id: conflicting_id,
                        attempt: bumped,
                        inserted: external_block,
                    })
                }
                Err(_) => {
                    // Every strategy failed; the block was already
                    // soft-removed above. Leave it removed per §4.1.
                    tracing::warn!(
                        block_id = %conflicting_id,
                        external_id = %event.external_id,
                        "exhausted reschedule strategies for conflicting block, removing it"
                    );
                    Ok(ImportOutcome::Removed {
                        removed_block_id: conflicting_id,
                        attempt,
                        inserted: external_block,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use orbita_kernel::domain::schedule::Interval;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 26).unwrap()
    }

    fn iv(h1: u32, h2: u32) -> Interval {
        let d = Utc.from_utc_datetime(&date().and_hms_opt(0, 0, 0).unwrap());
        Interval::new(d + chrono::Duration::hours(h1 as i64), d + chrono::Duration::hours(h2 as i64)).unwrap()
    }

    fn schedules() -> (Schedule, Schedule) {
        let owner = Uuid::new_v4();
        (
            Schedule::new(owner, date()),
            Schedule::new(owner, date().succ_opt().unwrap()),
        )
    }

    #[test]
    fn non_conflicting_event_is_inserted_directly() {
        let window = WorkingWindow::default();
        let (mut schedule, mut tomorrow) = schedules();
        let event = ExternalEvent {
            external_id: "ext-1".into(),
            title: "Dentist".into(),
            interval: iv(10, 11),
        };
        let outcome = import_event(&mut schedule, &mut tomorrow, &window, &[], &event, ConflictStrategy::ExternalWins, Utc::now()).unwrap();
        assert!(matches!(outcome, ImportOutcome::Inserted(_)));
    }

    #[test]
    fn external_wins_bumps_the_internal_block_later() {
        let window = WorkingWindow::default();
        let (mut schedule, mut tomorrow) = schedules();
        let internal = Block::new(BlockKind::Task, "t1", "Write report", iv(10, 11));
        let internal_id = internal.id;
        schedule.add_block(internal).unwrap();

        let event = ExternalEvent {
            external_id: "ext-1".into(),
            title: "Client call".into(),
            interval: iv(10, 11),
        };
        let outcome = import_event(&mut schedule, &mut tomorrow, &window, &[], &event, ConflictStrategy::ExternalWins, Utc::now()).unwrap();
        match outcome {
            ImportOutcome::Rescheduled { attempt, moved_block_id, .. } => {
                assert_eq!(moved_block_id, internal_id);
                assert!(attempt.to_interval.unwrap().start >= iv(11, 12).start);
            }
            other => panic!("expected Rescheduled, got {other:?}"),
        }
        assert!(schedule.check_invariant());
    }

    #[test]
    fn external_wins_bumps_to_next_day_once_today_is_full() {
        let window = WorkingWindow::default();
        let (mut schedule, mut tomorrow) = schedules();
        let day = window.instants_for(date()).unwrap();

        let internal = Block::new(BlockKind::Task, "t1", "Write report", day);
        let internal_id = internal.id;
        schedule.add_block(internal).unwrap();

        let event = ExternalEvent {
            external_id: "ext-1".into(),
            title: "Client call".into(),
            interval: day,
        };
        let outcome = import_event(&mut schedule, &mut tomorrow, &window, &[], &event, ConflictStrategy::ExternalWins, Utc::now()).unwrap();
        match outcome {
            ImportOutcome::Rescheduled { moved_block_id, attempt, .. } => {
                assert_eq!(moved_block_id, internal_id);
                let to = attempt.to_interval.expect("bumped to a concrete slot");
                assert_eq!(to.start.date_naive(), date().succ_opt().unwrap());
            }
            other => panic!("expected Rescheduled, got {other:?}"),
        }
        assert!(tomorrow.active_blocks().iter().any(|b| b.id == internal_id));
        assert!(schedule.check_invariant());
        assert!(tomorrow.check_invariant());
    }

    #[test]
    fn external_wins_removes_the_block_once_every_strategy_is_exhausted() {
        let window = WorkingWindow::default();
        let owner = Uuid::new_v4();
        let mut schedule = Schedule::new(owner, date());
        let mut tomorrow = Schedule::new(owner, date().succ_opt().unwrap());
        let day = window.instants_for(date()).unwrap();
        let tomorrow_day = window.instants_for(date().succ_opt().unwrap()).unwrap();

        // Pack tomorrow's entire working window too, so the cross-day
        // bump has nowhere to land either.
        tomorrow
            .add_block(Block::new(BlockKind::Task, "filler", "Filler", tomorrow_day))
            .unwrap();

        let internal = Block::new(BlockKind::Task, "t1", "Write report", day);
        let internal_id = internal.id;
        schedule.add_block(internal).unwrap();

        let event = ExternalEvent {
            external_id: "ext-1".into(),
            title: "Client call".into(),
            interval: day,
        };
        let outcome = import_event(&mut schedule, &mut tomorrow, &window, &[], &event, ConflictStrategy::ExternalWins, Utc::now()).unwrap();
        match outcome {
            ImportOutcome::Removed { removed_block_id, .. } => {
                assert_eq!(removed_block_id, internal_id);
            }
            other => panic!("expected Removed, got {other:?}"),
        }
        assert!(schedule
            .blocks
            .iter()
            .find(|b| b.id == internal_id)
            .is_some_and(|b| b.state == BlockState::Removed));
        assert!(schedule
            .active_blocks()
            .iter()
            .any(|b| b.kind == BlockKind::External));
    }

    #[test]
    fn overlapping_a_completed_block_is_skipped_without_mutation() {
        let window = WorkingWindow::default();
        let (mut schedule, mut tomorrow) = schedules();
        let completed = Block::new(BlockKind::Task, "t1", "Write report", iv(10, 11));
        let completed_id = completed.id;
        schedule.add_block(completed).unwrap();
        schedule.complete_block(completed_id).unwrap();

        let event = ExternalEvent {
            external_id: "ext-1".into(),
            title: "Client call".into(),
            interval: iv(10, 11),
        };
        let outcome = import_event(&mut schedule, &mut tomorrow, &window, &[], &event, ConflictStrategy::ExternalWins, Utc::now()).unwrap();
        assert!(matches!(outcome, ImportOutcome::SkippedCompleted));
        assert_eq!(schedule.active_blocks().len(), 1);
        assert!(schedule.check_invariant());
    }

    #[test]
    fn internal_wins_drops_the_external_event() {
        let window = WorkingWindow::default();
        let (mut schedule, mut tomorrow) = schedules();
        schedule
            .add_block(Block::new(BlockKind::Task, "t1", "Write report", iv(10, 11)))
            .unwrap();

        let event = ExternalEvent {
            external_id: "ext-1".into(),
            title: "Client call".into(),
            interval: iv(10, 11),
        };
        let outcome = import_event(&mut schedule, &mut tomorrow, &window, &[], &event, ConflictStrategy::InternalWins, Utc::now()).unwrap();
        assert!(matches!(outcome, ImportOutcome::SkippedInternalWins));
        assert_eq!(schedule.active_blocks().len(), 1);
    }

    #[test]
    fn reimporting_the_same_external_id_is_a_no_op() {
        let window = WorkingWindow::default();
        let (mut schedule, mut tomorrow) = schedules();
        let event = ExternalEvent {
            external_id: "ext-1".into(),
            title: "Dentist".into(),
            interval: iv(10, 11),
        };
        import_event(&mut schedule, &mut tomorrow, &window, &[], &event, ConflictStrategy::ExternalWins, Utc::now()).unwrap();
        let outcome = import_event(&mut schedule, &mut tomorrow, &window, &[], &event, ConflictStrategy::ExternalWins, Utc::now()).unwrap();
        assert!(matches!(outcome, ImportOutcome::AlreadyImported));
    }
}
