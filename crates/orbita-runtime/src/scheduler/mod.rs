//! Scheduler engine: slot search, placement, and auto-reschedule.
//!
//! Pure and deterministic given its inputs — no I/O, no implicit clock
//! reads — mirroring `mofa_kernel::scheduler`'s split of injectable time
//! (there: `Clock`; here: an explicit `now` argument) from the trait
//! contract. All failure is returned as data (§4.1).

pub mod engine;
pub mod reschedule;

pub use engine::{auto_schedule, find_slot, place, PlacementRequest, WorkingWindow};
pub use reschedule::{attempts_today, auto_reschedule, bump_to_next_working_day, MAX_ATTEMPTS_PER_DAY};

use orbita_kernel::domain::schedule::Interval;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchedulerError {
    #[error("no free interval of required length exists in the working window")]
    NoSlotAvailable,
    #[error("invalid interval: {0}")]
    InvalidInterval(String),
    #[error("unable to resolve conflict for block after exhausting reschedule strategies")]
    ConflictIrresolvable,

    #[error(transparent)]
    Kernel(#[from] orbita_kernel::KernelError),
}

impl PartialEq for SchedulerError {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::NoSlotAvailable, Self::NoSlotAvailable)
                | (Self::ConflictIrresolvable, Self::ConflictIrresolvable)
        ) || matches!((self, other), (Self::InvalidInterval(a), Self::InvalidInterval(b)) if a == b)
    }
}
impl Eq for SchedulerError {}

/// An unplaced item to auto-schedule.
#[derive(Debug, Clone)]
pub struct UnplacedItem {
    pub source_id: String,
    pub kind: orbita_kernel::domain::schedule::BlockKind,
    pub title: String,
    pub duration_minutes: u32,
    pub priority: orbita_kernel::domain::task::Priority,
    pub anchor: Option<chrono::DateTime<chrono::Utc>>,
    pub preferred_time: Option<orbita_kernel::domain::habit::PreferredTime>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Result of a single item's placement attempt in a batch.
#[derive(Debug)]
pub enum PlacementOutcome {
    Placed(orbita_kernel::domain::schedule::Block),
    Failed {
        source_id: String,
        error: SchedulerError,
    },
}

/// A day's free-interval set: the working window minus the union of
/// existing active block intervals.
pub fn free_intervals(
    schedule: &orbita_kernel::domain::schedule::Schedule,
    window: &WorkingWindow,
) -> Vec<Interval> {
    let Some(day_window) = window.instants_for(schedule.date) else {
        return Vec::new();
    };

    let mut busy: Vec<Interval> = schedule
        .active_blocks()
        .into_iter()
        .filter(|b| b.state != orbita_kernel::domain::schedule::BlockState::Removed)
        .map(|b| b.interval)
        .filter(|iv| iv.overlaps(&day_window))
        .collect();
    busy.sort_by_key(|iv| iv.start);

    let mut free = Vec::new();
    let mut cursor = day_window.start;
    for b in busy {
        let clamped_start = b.start.max(day_window.start);
        let clamped_end = b.end.min(day_window.end);
        if clamped_start > cursor {
            if let Ok(iv) = Interval::new(cursor, clamped_start) {
                free.push(iv);
            }
        }
        if clamped_end > cursor {
            cursor = clamped_end;
        }
    }
    if cursor < day_window.end {
        if let Ok(iv) = Interval::new(cursor, day_window.end) {
            free.push(iv);
        }
    }
    free
}
