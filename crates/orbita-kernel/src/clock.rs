//! Injectable time source.
//!
//! The scheduler, habit learner, and license verifier are pure given an
//! explicit instant; the only non-determinism any of them has is "what time
//! is it", which every caller supplies through this trait rather than by
//! calling `Utc::now()` directly. Tests substitute [`FixedClock`] to make
//! time-dependent behavior reproducible.

use chrono::{DateTime, Utc};

/// Provides the current wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The default [`Clock`], backed by the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always returns the same instant. Used in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
