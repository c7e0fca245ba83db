use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::models::{GameProfile, Instrument};

/// Fold passive income earned since the last interaction into `profile`.
///
/// Income runs from `last_accrual_at` up to `min(now, accrual_window_end)`.
/// Afterwards the profile is stamped at `now` and a fresh window of
/// `window` length opens, whether or not anything was earned. Returns the
/// amount credited.
pub fn accrue(
    profile: &mut GameProfile,
    instrument: Instrument,
    rate_per_sec: f64,
    now: DateTime<Utc>,
    window: Duration,
) -> f64 {
    let end = now.min(profile.accrual_window_end);
    let mut earned = 0.0;
    if end > profile.last_accrual_at {
        let elapsed = (end - profile.last_accrual_at).num_milliseconds() as f64 / 1000.0;
        earned = rate_per_sec * elapsed;
        profile.credit(instrument, earned);
        debug!(earned, elapsed, rate_per_sec, "accrued passive income");
    }
    profile.last_accrual_at = now;
    profile.accrual_window_end = now + window;
    earned
}

/// Time left before income stalls, never negative.
pub fn window_remaining(profile: &GameProfile, now: DateTime<Utc>) -> Duration {
    (profile.accrual_window_end - now).max(Duration::zero())
}
