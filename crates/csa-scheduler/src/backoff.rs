//! Retry/backoff policies for the three transport implementations
//! (spec §4.1 "Retry policy", SPEC_FULL supplement).
//!
//! Each provider backs off differently in the original prototype:
//! the vendor-gateway transport doubles a 32s seed up to a handful of
//! times, while the OpenAI-compatible and hosted-chat transports use a
//! classic `base * 2^attempt` curve with jitter. Both are modeled here so
//! `csa-executor` never hand-rolls timing math.

use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use std::time::Duration;

/// `base * 2^attempt`, capped at `max`, plus up to 25% jitter.
pub fn exponential_backoff(base: Duration, attempt: u32, max: Duration) -> Duration {
    let scaled = base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    let capped = scaled.min(max);
    add_jitter(capped, 0.25)
}

/// The vendor-gateway transport's doubling sequence: 32s, 64s, 128s, ...
/// capped at `max`.
pub fn vendor_gateway_backoff(attempt: u32, max: Duration) -> Duration {
    const SEED: Duration = Duration::from_secs(32);
    let scaled = SEED.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    scaled.min(max)
}

fn add_jitter(d: Duration, fraction: f64) -> Duration {
    let jitter_range = d.as_secs_f64() * fraction;
    let jitter = rand::thread_rng().gen_range(0.0..=jitter_range);
    d + Duration::from_secs_f64(jitter)
}

/// Seconds remaining until local midnight, used when a provider reports a
/// hard daily quota exhaustion rather than a short-lived rate limit.
pub fn seconds_until_midnight() -> u64 {
    let now = Utc::now();
    let tomorrow_midnight = (now + ChronoDuration::days(1))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (tomorrow_midnight - now.naive_utc()).num_seconds().max(0) as u64
}
