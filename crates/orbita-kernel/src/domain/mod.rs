pub mod events;
pub mod habit;
pub mod license;
pub mod meeting;
pub mod outbox;
pub mod schedule;
pub mod task;

pub use events::{DomainEvent, EventHeader};
pub use habit::{Frequency, Habit, HabitCompletion, PreferredTime};
pub use license::{EntitlementModule, License, LicenseStatus};
pub use meeting::{Cadence, Meeting};
pub use outbox::{OutboxMessage, OutboxState};
pub use schedule::{Block, BlockKind, BlockState, Interval, RescheduleAttempt, Schedule};
pub use task::{Priority, Task, TaskStatus};
