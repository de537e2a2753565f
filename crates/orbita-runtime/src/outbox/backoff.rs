//! Exponential backoff with jitter for outbox retry scheduling.
//! Adapted from `mofa_runtime::retry::RetryPolicy::ExponentialBackoff`,
//! specialized to the outbox's own attempt counter instead of a
//! general-purpose retry-policy enum.

use rand::Rng;
use std::time::Duration;

/// `min(max_ms, base_ms * 2^attempts)` plus uniform jitter in
/// `[0, 100ms)`, per SPEC_FULL.md's outbox defaults.
pub fn next_retry_delay(attempts: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exp = 1u64
        .checked_shl(attempts)
        .and_then(|s| base_ms.checked_mul(s))
        .unwrap_or(max_ms);
    let capped = exp.min(max_ms);
    let jitter_ms = rand::thread_rng().gen_range(0..100);
    Duration::from_millis(capped.saturating_add(jitter_ms))
}
