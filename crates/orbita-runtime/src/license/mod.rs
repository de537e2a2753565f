//! License key generation, Ed25519 verification, and the entitlement
//! gate built on top of them.

pub mod entitlement;
pub mod keys;
pub mod verifier;

pub use entitlement::EntitlementService;
pub use verifier::{signing_payload, LicenseVerifier, LicenseVerifierError};
