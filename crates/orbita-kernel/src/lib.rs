//! Domain model, repository contracts, and error types for the Orbita
//! scheduling core.
//!
//! This crate holds no I/O and no concrete service implementations —
//! those live in `orbita-runtime`, which depends on this crate the way
//! `mofa-runtime`/`mofa-foundation` depend on `mofa-kernel`'s trait
//! contracts.

pub mod clock;
pub mod domain;
pub mod error;
pub mod repository;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ErrorKind, KernelError, KernelResult};
