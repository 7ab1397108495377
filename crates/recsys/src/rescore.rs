//! Candidate rescoring: time decay, then jitter
//!
//! Applied once per candidate group before blending. The transforms return
//! a fresh list; callers must not rescore the same list twice.

use chrono::{DateTime, Utc};
use citypulse_core::models::recommendation::RecItem;
use rand::Rng;

/// Exponential decay rate per day of distance between the event start and
/// the request time.
pub const TIME_DECAY_RATE: f64 = 0.002;

/// Half-width of the uniform jitter added to every score.
pub const JITTER_AMPLITUDE: f32 = 0.03;

/// Rescore one candidate group: exponential time decay first, uniform
/// jitter second.
pub fn rescore(candidates: &[RecItem], now: DateTime<Utc>) -> Vec<RecItem> {
    let mut rng = rand::thread_rng();
    candidates
        .iter()
        .map(|item| {
            let decayed = with_time_decay(item, now);
            let jitter: f32 = rng.gen_range(-JITTER_AMPLITUDE..=JITTER_AMPLITUDE);
            decayed.with_score(decayed.score + jitter)
        })
        .collect()
}

/// Multiply the score by `exp(-rate * d)` where `d` is the distance between
/// the event start and `now` in whole days. Events near the request time,
/// on either side, keep more of their score.
fn with_time_decay(item: &RecItem, now: DateTime<Utc>) -> RecItem {
    let days = (item.event.datetime_from - now).num_days().abs();
    let factor = (-TIME_DECAY_RATE * days as f64).exp();
    item.with_score((item.score as f64 * factor) as f32)
}
