//! Crate-level error taxonomy.
//!
//! Mirrors the stable machine-readable error kinds from the command-surface
//! contract: validation, not-found, not-owner, conflict, and infrastructure
//! errors are distinguished so a caller (a CLI, out of scope here) can map
//! them to exit codes without re-deriving the distinction itself.

use thiserror::Error;

/// The stable, machine-readable classification of a [`KernelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    NotOwner,
    Conflict,
    LicenseRequired,
    Infrastructure,
}

/// Crate-level error type for the Orbita domain core.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KernelError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{aggregate} '{id}' not found")]
    NotFound { aggregate: &'static str, id: String },

    #[error("caller does not own {aggregate} '{id}'")]
    NotOwner { aggregate: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("premium entitlement '{module}' required")]
    LicenseRequired { module: String },

    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl KernelError {
    /// The stable kind used to pick an exit code / HTTP status upstream.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::Validation(_) => ErrorKind::Validation,
            KernelError::NotFound { .. } => ErrorKind::NotFound,
            KernelError::NotOwner { .. } => ErrorKind::NotOwner,
            KernelError::Conflict(_) => ErrorKind::Conflict,
            KernelError::LicenseRequired { .. } => ErrorKind::LicenseRequired,
            KernelError::Infrastructure(_) => ErrorKind::Infrastructure,
        }
    }

    /// Whether a caller may usefully retry this error (infra + conflict are
    /// retriable; the rest require different input).
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Infrastructure | ErrorKind::Conflict)
    }
}

pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_contains_id() {
        let e = KernelError::NotFound {
            aggregate: "Task",
            id: "abc-123".into(),
        };
        assert!(e.to_string().contains("abc-123"));
        assert_eq!(e.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn infrastructure_errors_are_retryable() {
        let e = KernelError::Infrastructure("db timeout".into());
        assert!(e.is_retryable());
    }

    #[test]
    fn validation_errors_are_not_retryable() {
        let e = KernelError::Validation("duration must be >= 1".into());
        assert!(!e.is_retryable());
    }

    #[test]
    fn conflict_errors_are_retryable() {
        let e = KernelError::Conflict("schedule overlap".into());
        assert!(e.is_retryable());
    }
}
