//! The external-calendar seam. Grounded on the [`crate::outbox::sink::Publisher`]
//! shape: a thin `async_trait` boundary the coordinator drives, with one
//! concrete test double standing in for a real provider client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orbita_kernel::domain::schedule::Interval;

#[derive(Debug, thiserror::Error)]
#[error("calendar provider error: {0}")]
pub struct ProviderError(pub String);

/// A normalized event as read from an external calendar. `external_id`
/// is stable across fetches and is what makes re-importing the same
/// event idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalEvent {
    pub external_id: String,
    pub title: String,
    pub interval: Interval,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Every external event overlapping `window`, provider-supplied
    /// ordering is not assumed.
    async fn fetch_events(&self, window: Interval) -> Result<Vec<ExternalEvent>, ProviderError>;
}

/// A provider backed by a fixed, in-memory event list — used in tests
/// and as the default for providers that are not yet wired to a real
/// calendar backend.
pub struct StaticProvider {
    events: Vec<ExternalEvent>,
}

impl StaticProvider {
    pub fn new(events: Vec<ExternalEvent>) -> Self {
        StaticProvider { events }
    }
}

#[async_trait]
impl CalendarProvider for StaticProvider {
    async fn fetch_events(&self, window: Interval) -> Result<Vec<ExternalEvent>, ProviderError> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.interval.overlaps(&window))
            .cloned()
            .collect())
    }
}

/// The cursor state of one connected external calendar (spec §4.4).
#[derive(Debug, Clone)]
pub struct ConnectedCalendar {
    pub owner_id: uuid::Uuid,
    pub provider_id: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl ConnectedCalendar {
    pub fn new(owner_id: uuid::Uuid, provider_id: impl Into<String>) -> Self {
        ConnectedCalendar {
            owner_id,
            provider_id: provider_id.into(),
            last_synced_at: None,
        }
    }
}
