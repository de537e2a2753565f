//! Schedule and Block aggregates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KernelError, KernelResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Task,
    Habit,
    Meeting,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockState {
    Scheduled,
    Completed,
    Removed,
}

/// A minute-aligned half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> KernelResult<Self> {
        if end <= start {
            return Err(KernelError::Validation(
                "block end must be after start".into(),
            ));
        }
        Ok(Interval { start, end })
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// `max(startA, startB) < min(endA, endB)`.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start.max(other.start) < self.end.min(other.end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    pub kind: BlockKind,
    /// The Task/Habit/Meeting id, or the external provider event id.
    pub source_id: String,
    pub title: String,
    pub interval: Interval,
    pub state: BlockState,
}

impl Block {
    pub fn new(kind: BlockKind, source_id: impl Into<String>, title: impl Into<String>, interval: Interval) -> Self {
        Block {
            id: Uuid::new_v4(),
            kind,
            source_id: source_id.into(),
            title: title.into(),
            interval,
            state: BlockState::Scheduled,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state != BlockState::Removed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAttempt {
    pub id: Uuid,
    pub block_id: Uuid,
    pub from_interval: Interval,
    pub to_interval: Option<Interval>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub owner_id: Uuid,
    pub date: NaiveDate,
    pub blocks: Vec<Block>,
}

impl Schedule {
    pub fn new(owner_id: Uuid, date: NaiveDate) -> Self {
        Schedule {
            owner_id,
            date,
            blocks: Vec::new(),
        }
    }

    /// Non-removed blocks, in start-time order.
    pub fn active_blocks(&self) -> Vec<&Block> {
        let mut blocks: Vec<&Block> = self.blocks.iter().filter(|b| b.is_active()).collect();
        blocks.sort_by_key(|b| b.interval.start);
        blocks
    }

    /// Appends `block` iff it does not overlap any existing non-removed,
    /// non-completed block. Completed blocks are historical and excluded
    /// from the overlap check per the schedule invariant.
    pub fn add_block(&mut self, block: Block) -> KernelResult<()> {
        let conflicts = self.blocks.iter().any(|existing| {
            existing.state == BlockState::Scheduled && existing.interval.overlaps(&block.interval)
        });
        if conflicts {
            return Err(KernelError::Conflict(
                "block overlaps an existing scheduled block".into(),
            ));
        }
        self.blocks.push(block);
        Ok(())
    }

    pub fn find_block_mut(&mut self, block_id: Uuid) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.id == block_id)
    }

    pub fn complete_block(&mut self, block_id: Uuid) -> KernelResult<()> {
        let block = self.find_block_mut(block_id).ok_or(KernelError::NotFound {
            aggregate: "Block",
            id: block_id.to_string(),
        })?;
        block.state = BlockState::Completed;
        Ok(())
    }

    /// Soft-remove a block, freeing its interval.
    pub fn remove_block(&mut self, block_id: Uuid) -> KernelResult<()> {
        let block = self.find_block_mut(block_id).ok_or(KernelError::NotFound {
            aggregate: "Block",
            id: block_id.to_string(),
        })?;
        block.state = BlockState::Removed;
        Ok(())
    }

    /// Check the no-overlap invariant holds across all non-removed blocks.
    pub fn check_invariant(&self) -> bool {
        let active = self.active_blocks();
        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                if active[i].interval.overlaps(&active[j].interval) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod overlap_tests {
    use super::*;
    use chrono::TimeZone;

    fn iv(h1: u32, m1: u32, h2: u32, m2: u32) -> Interval {
        let d = Utc.with_ymd_and_hms(2026, 1, 23, 0, 0, 0).unwrap();
        Interval::new(
            d + chrono::Duration::minutes((h1 * 60 + m1) as i64),
            d + chrono::Duration::minutes((h2 * 60 + m2) as i64),
        )
        .unwrap()
    }

    #[test]
    fn adjacent_intervals_do_not_overlap() {
        let a = iv(9, 0, 10, 0);
        let b = iv(10, 0, 11, 0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn overlapping_intervals_detected() {
        let a = iv(9, 0, 10, 0);
        let b = iv(9, 30, 10, 30);
        assert!(a.overlaps(&b));
    }

    #[test]
    fn add_block_rejects_overlap() {
        let owner = Uuid::new_v4();
        let date = Utc.with_ymd_and_hms(2026, 1, 23, 0, 0, 0).unwrap().date_naive();
        let mut schedule = Schedule::new(owner, date);
        schedule
            .add_block(Block::new(BlockKind::Task, "t1", "T1", iv(9, 0, 10, 0)))
            .unwrap();
        let err = schedule
            .add_block(Block::new(BlockKind::Task, "t2", "T2", iv(9, 30, 10, 30)))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
        assert!(schedule.check_invariant());
    }

    #[test]
    fn removed_block_frees_its_interval() {
        let owner = Uuid::new_v4();
        let date = Utc.with_ymd_and_hms(2026, 1, 23, 0, 0, 0).unwrap().date_naive();
        let mut schedule = Schedule::new(owner, date);
        let block = Block::new(BlockKind::Task, "t1", "T1", iv(9, 0, 10, 0));
        let id = block.id;
        schedule.add_block(block).unwrap();
        schedule.remove_block(id).unwrap();
        schedule
            .add_block(Block::new(BlockKind::Task, "t2", "T2", iv(9, 30, 10, 30)))
            .unwrap();
        assert!(schedule.check_invariant());
    }
}
