//! Reconnect backoff calculation.
//!
//! Portable, sync-only math for the client's reconnect policy. The async
//! scheduling (cancellable sleeps) lives in `concierge-client`; this module
//! only answers "how long until the next attempt, if any."
//!
//! The ladder is `min(1000 · 2^attempt, 30000)` milliseconds with a hard
//! ceiling of 10 attempts, after which the manager gives up silently. The
//! fail-stop is deliberate: the relay is a best-effort notification channel
//! layered over polling, and CRUD data stays fetchable on demand.

use std::time::Duration;

/// Base delay for the first reconnect attempt.
pub const BASE_DELAY_MS: u64 = 1000;
/// Cap on any single reconnect delay.
pub const MAX_DELAY_MS: u64 = 30_000;
/// Attempts after which the manager stops reconnecting.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Delay before reconnect attempt number `attempt` (zero-based), or `None`
/// once the ceiling is reached.
#[must_use]
pub fn reconnect_delay(attempt: u32) -> Option<Duration> {
    if attempt >= MAX_RECONNECT_ATTEMPTS {
        return None;
    }
    // Shift is clamped so pathological attempt counts cannot overflow.
    let exponential = BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(31));
    Some(Duration::from_millis(exponential.min(MAX_DELAY_MS)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
