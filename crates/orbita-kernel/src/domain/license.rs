//! License aggregate and the entitlement catalog.
//!
//! Signature verification and status computation live in
//! `orbita-runtime::license` (they need Ed25519 and a clock); this module
//! only holds the data shape and the closed set of premium modules, per
//! SPEC_FULL.md §D.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The premium modules a license can grant. Closed set per SPEC_FULL.md §D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntitlementModule {
    SmartHabits,
    AiInbox,
    AutoRescheduler,
    PriorityEngine,
    AdaptiveFrequency,
    Smart1to1,
}

impl EntitlementModule {
    pub const ALL: [EntitlementModule; 6] = [
        EntitlementModule::SmartHabits,
        EntitlementModule::AiInbox,
        EntitlementModule::AutoRescheduler,
        EntitlementModule::PriorityEngine,
        EntitlementModule::AdaptiveFrequency,
        EntitlementModule::Smart1to1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntitlementModule::SmartHabits => "smart-habits",
            EntitlementModule::AiInbox => "ai-inbox",
            EntitlementModule::AutoRescheduler => "auto-rescheduler",
            EntitlementModule::PriorityEngine => "priority-engine",
            EntitlementModule::AdaptiveFrequency => "adaptive-frequency",
            EntitlementModule::Smart1to1 => "smart-1to1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseStatus {
    Trial,
    FreeTier,
    Active,
    GracePeriod,
    Expired,
    Invalid,
}

impl LicenseStatus {
    /// `trial`, `active`, and `gracePeriod` honor the licensed entitlement
    /// set; every other status grants none (entitlement monotonicity, §8).
    pub fn grants_entitlements(self) -> bool {
        matches!(
            self,
            LicenseStatus::Trial | LicenseStatus::Active | LicenseStatus::GracePeriod
        )
    }
}

/// The on-disk license document (§6 wire format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub version: u32,
    pub license_key: Option<String>,
    pub license_id: Option<String>,
    pub email: Option<String>,
    pub plan: Option<String>,
    pub entitlements: Vec<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub signature: Option<String>,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub trial_started_at: DateTime<Utc>,
}

impl License {
    /// A fresh, never-activated license document, as created on first run
    /// when no license file exists.
    pub fn new_trial(now: DateTime<Utc>) -> Self {
        License {
            version: 1,
            license_key: None,
            license_id: None,
            email: None,
            plan: None,
            entitlements: Vec::new(),
            issued_at: None,
            expires_at: None,
            signature: None,
            last_validated_at: None,
            trial_started_at: now,
        }
    }
}
