//! Ed25519 signature verification and status computation. Grounded on
//! `knhk_workflow_engine::licensing::LicenseToken::verify_signature`,
//! whose real implementation the teacher left as a stub noting "uses
//! ed25519_dalek" — this is that real implementation.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use orbita_kernel::domain::license::{License, LicenseStatus};
use thiserror::Error;

const TRIAL_DAYS: i64 = 14;
const GRACE_PERIOD_DAYS: i64 = 7;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LicenseVerifierError {
    #[error("malformed verifying key: {0}")]
    MalformedKey(String),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}

/// The message signed over a license: `licenseId|plan|sortedEntitlementsCsv|expiresAtRFC3339`.
pub fn signing_payload(license: &License) -> String {
    let mut entitlements = license.entitlements.clone();
    entitlements.sort();
    format!(
        "{}|{}|{}|{}",
        license.license_id.as_deref().unwrap_or(""),
        license.plan.as_deref().unwrap_or(""),
        entitlements.join(","),
        license
            .expires_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default(),
    )
}

pub struct LicenseVerifier {
    verifying_key: VerifyingKey,
}

impl LicenseVerifier {
    pub fn new(verifying_key: VerifyingKey) -> Self {
        LicenseVerifier { verifying_key }
    }

    pub fn from_hex(hex_key: &str) -> Result<Self, LicenseVerifierError> {
        let bytes = hex::decode(hex_key)
            .map_err(|e| LicenseVerifierError::MalformedKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LicenseVerifierError::MalformedKey("expected 32 bytes".into()))?;
        let verifying_key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| LicenseVerifierError::MalformedKey(e.to_string()))?;
        Ok(LicenseVerifier::new(verifying_key))
    }

    /// `true` iff `license.signature` is a valid Ed25519 signature over
    /// [`signing_payload`] under this verifier's key.
    pub fn verify(&self, license: &License) -> bool {
        let Some(signature_hex) = &license.signature else {
            return false;
        };
        let Ok(signature_bytes) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(signature_bytes): Result<[u8; 64], _> = signature_bytes.try_into() else {
            return false;
        };
        let signature = Signature::from_bytes(&signature_bytes);
        let payload = signing_payload(license);
        self.verifying_key
            .verify(payload.as_bytes(), &signature)
            .is_ok()
    }

    /// Computes the license's current status per SPEC_FULL.md / spec §4.6.
    pub fn status(&self, license: &License, now: DateTime<Utc>) -> LicenseStatus {
        if license.license_key.is_none() {
            let trial_ends = license.trial_started_at + chrono::Duration::days(TRIAL_DAYS);
            return if now < trial_ends {
                LicenseStatus::Trial
            } else {
                LicenseStatus::FreeTier
            };
        }

        if !self.verify(license) {
            return LicenseStatus::Invalid;
        }

        let Some(expires_at) = license.expires_at else {
            return LicenseStatus::Invalid;
        };
        if now < expires_at {
            LicenseStatus::Active
        } else if now < expires_at + chrono::Duration::days(GRACE_PERIOD_DAYS) {
            LicenseStatus::GracePeriod
        } else {
            LicenseStatus::Expired
        }
    }
}
