//! Configuration loading: defaults layered with an optional file and
//! `ORBITA__`-prefixed environment variables, grounded on
//! `mofa_kernel::config`'s format-detecting, multi-source `load_merged`
//! — here built on the `config` crate's native [`Environment`] source
//! instead of hand-rolled env-var substitution, since every setting is
//! strongly typed up front.

use std::path::Path;

use config::{Config as RawConfig, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingWindowConfig {
    pub start_hour: u32,
    pub end_hour: u32,
    pub weekday_mask: [bool; 7],
}

impl Default for WorkingWindowConfig {
    fn default() -> Self {
        WorkingWindowConfig {
            start_hour: 9,
            end_hour: 18,
            weekday_mask: [true, true, true, true, true, false, false],
        }
    }
}

impl From<&WorkingWindowConfig> for crate::scheduler::WorkingWindow {
    fn from(cfg: &WorkingWindowConfig) -> Self {
        crate::scheduler::WorkingWindow {
            start: chrono::NaiveTime::from_hms_opt(cfg.start_hour, 0, 0).unwrap(),
            end: chrono::NaiveTime::from_hms_opt(cfg.end_hour, 0, 0).unwrap(),
            weekday_mask: cfg.weekday_mask,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxConfig {
    pub poll_interval_ms: u64,
    pub batch_size: usize,
    pub max_retries: u32,
    pub max_backoff_ms: u64,
    pub base_backoff_ms: u64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        OutboxConfig {
            poll_interval_ms: 1_000,
            batch_size: 50,
            max_retries: 5,
            max_backoff_ms: 60_000,
            base_backoff_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSyncConfig {
    pub sync_interval_secs: u64,
    pub look_ahead_days: i64,
}

impl Default for CalendarSyncConfig {
    fn default() -> Self {
        CalendarSyncConfig {
            sync_interval_secs: 300,
            look_ahead_days: 14,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseConfig {
    pub license_file_path: String,
    pub verifying_key_hex: Option<String>,
    pub trial_days: i64,
    pub grace_period_days: i64,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        LicenseConfig {
            license_file_path: "license.json".into(),
            verifying_key_hex: None,
            trial_days: 14,
            grace_period_days: 7,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrbitaConfig {
    #[serde(default)]
    pub working_window: WorkingWindowConfig,
    #[serde(default)]
    pub outbox: OutboxConfig,
    #[serde(default)]
    pub calendar_sync: CalendarSyncConfig,
    #[serde(default)]
    pub license: LicenseConfig,
}

impl OrbitaConfig {
    /// Defaults layered with an optional config file (TOML, YAML, or
    /// JSON, detected from its extension) and `ORBITA__SECTION__FIELD`
    /// environment variables, later sources winning.
    pub fn load(file_path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = RawConfig::builder()
            .set_default("workingWindow.startHour", 9)?
            .set_default("workingWindow.endHour", 18)?
            .set_default(
                "workingWindow.weekdayMask",
                vec![true, true, true, true, true, false, false],
            )?
            .set_default("outbox.pollIntervalMs", 1_000)?
            .set_default("outbox.batchSize", 50)?
            .set_default("outbox.maxRetries", 5)?
            .set_default("outbox.maxBackoffMs", 60_000)?
            .set_default("outbox.baseBackoffMs", 100)?
            .set_default("calendarSync.syncIntervalSecs", 300)?
            .set_default("calendarSync.lookAheadDays", 14)?
            .set_default("license.licenseFilePath", "license.json")?
            .set_default("license.trialDays", 14)?
            .set_default("license.gracePeriodDays", 7)?;

        if let Some(path) = file_path {
            let format = detect_format(path);
            builder = builder.add_source(File::from(path).format(format).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("ORBITA")
                .separator("__")
                .try_parsing(true),
        );

        let raw = builder.build()?;
        Ok(raw.try_deserialize()?)
    }
}

fn detect_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Toml,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_working_window() {
        let cfg = OrbitaConfig::load(None).unwrap();
        assert_eq!(cfg.working_window.start_hour, 9);
        assert_eq!(cfg.working_window.end_hour, 18);
        assert_eq!(cfg.outbox.batch_size, 50);
        assert_eq!(cfg.license.trial_days, 14);
    }

    #[test]
    fn env_override_wins_over_default() {
        std::env::set_var("ORBITA__OUTBOX__BATCH_SIZE", "10");
        let cfg = OrbitaConfig::load(None).unwrap();
        std::env::remove_var("ORBITA__OUTBOX__BATCH_SIZE");
        assert_eq!(cfg.outbox.batch_size, 10);
    }
}
