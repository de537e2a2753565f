//! Tracing setup. Not invoked automatically — a binary entry point
//! calls [`init_tracing`] once at startup, the way `mofa` leaves
//! subscriber wiring to its host process rather than its library
//! crates.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a `tracing_subscriber` fmt layer honoring `RUST_LOG`,
/// defaulting to `info` when unset. Returns an error if a global
/// subscriber is already installed.
pub fn init_tracing() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
}
