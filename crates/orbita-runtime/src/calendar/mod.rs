//! External calendar sync: fetch, conflict resolution, and import.

pub mod conflict;
pub mod coordinator;
pub mod provider;

pub use conflict::{ConflictStrategy, ImportOutcome};
pub use coordinator::{CalendarSyncCoordinator, CalendarSyncError, SyncReport};
pub use provider::{CalendarProvider, ConnectedCalendar, ExternalEvent, ProviderError, StaticProvider};
