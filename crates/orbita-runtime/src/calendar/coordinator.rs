//! Periodic external-calendar sync (spec §4.4): fetch events in the
//! look-ahead window, import each one, update the connection's cursor.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use orbita_kernel::domain::schedule::{Interval, RescheduleAttempt, Schedule};

use crate::config::CalendarSyncConfig;
use crate::scheduler::{SchedulerError, WorkingWindow};

use super::conflict::{import_event, ConflictStrategy, ImportOutcome};
use super::provider::{CalendarProvider, ConnectedCalendar, ProviderError};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CalendarSyncError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub imported: usize,
    pub rescheduled: Vec<RescheduleAttempt>,
    /// Of `rescheduled`, how many ended in the conflicting block being
    /// permanently removed rather than relocated (§4.1's terminal case).
    pub removed: usize,
    pub skipped: usize,
    pub needs_manual_resolution: usize,
    pub already_imported: usize,
}

pub struct CalendarSyncCoordinator {
    provider: Arc<dyn CalendarProvider>,
    strategy: ConflictStrategy,
    config: CalendarSyncConfig,
}

impl CalendarSyncCoordinator {
    pub fn new(
        provider: Arc<dyn CalendarProvider>,
        strategy: ConflictStrategy,
        config: CalendarSyncConfig,
    ) -> Self {
        CalendarSyncCoordinator {
            provider,
            strategy,
            config,
        }
    }

    /// Fetches external events in `[now, now + lookAheadDays)`, imports
    /// each into `schedule`, and advances `connection.last_synced_at`.
    /// `next_day_schedule` and `log` back `ExternalWins`'s shift/bump
    /// escalation ladder (spec §4.1).
    pub async fn sync_once(
        &self,
        connection: &mut ConnectedCalendar,
        schedule: &mut Schedule,
        next_day_schedule: &mut Schedule,
        log: &[RescheduleAttempt],
        window: &WorkingWindow,
        now: DateTime<Utc>,
    ) -> Result<SyncReport, CalendarSyncError> {
        let look_ahead = Interval::new(now, now + chrono::Duration::days(self.config.look_ahead_days))
            .expect("look-ahead window is positive by construction");
        let events = self.provider.fetch_events(look_ahead).await?;

        let mut report = SyncReport::default();
        for event in &events {
            let outcome = import_event(schedule, next_day_schedule, window, log, event, self.strategy, now)?;
            match outcome {
                ImportOutcome::Inserted(_) => report.imported += 1,
                ImportOutcome::Rescheduled { attempt, .. } => {
                    report.imported += 1;
                    report.rescheduled.push(attempt);
                }
                ImportOutcome::Removed { attempt, .. } => {
                    report.imported += 1;
                    report.removed += 1;
                    report.rescheduled.push(attempt);
                }
                ImportOutcome::SkippedInternalWins => report.skipped += 1,
                ImportOutcome::SkippedCompleted => report.skipped += 1,
                ImportOutcome::NeedsManualResolution => report.needs_manual_resolution += 1,
                ImportOutcome::AlreadyImported => report.already_imported += 1,
            }
        }

        connection.last_synced_at = Some(now);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::provider::{ExternalEvent, StaticProvider};
    use chrono::{NaiveDate, TimeZone};
    use orbita_kernel::domain::schedule::{Block, BlockKind};
    use uuid::Uuid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 26).unwrap()
    }

    fn iv(h1: u32, h2: u32) -> Interval {
        let d = Utc.from_utc_datetime(&date().and_hms_opt(0, 0, 0).unwrap());
        Interval::new(
            d + chrono::Duration::hours(h1 as i64),
            d + chrono::Duration::hours(h2 as i64),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sync_imports_events_and_advances_cursor() {
        let owner = Uuid::new_v4();
        let mut schedule = Schedule::new(owner, date());
        let mut tomorrow = Schedule::new(owner, date().succ_opt().unwrap());
        schedule
            .add_block(Block::new(BlockKind::Task, "t1", "Write report", iv(10, 11)))
            .unwrap();

        let provider = Arc::new(StaticProvider::new(vec![ExternalEvent {
            external_id: "ext-1".into(),
            title: "Client call".into(),
            interval: iv(10, 11),
        }]));
        let coordinator = CalendarSyncCoordinator::new(
            provider,
            ConflictStrategy::ExternalWins,
            CalendarSyncConfig::default(),
        );
        let mut connection = ConnectedCalendar::new(owner, "test-provider");
        let now = Utc.from_utc_datetime(&date().and_hms_opt(0, 0, 0).unwrap());

        let report = coordinator
            .sync_once(&mut connection, &mut schedule, &mut tomorrow, &[], &WorkingWindow::default(), now)
            .await
            .unwrap();

        assert_eq!(report.imported, 1);
        assert_eq!(report.rescheduled.len(), 1);
        assert_eq!(report.removed, 0);
        assert!(connection.last_synced_at.is_some());
        assert!(schedule.check_invariant());
    }
}
