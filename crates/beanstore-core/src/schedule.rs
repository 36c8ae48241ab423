//! Wait computation for the daily featured-bean run.

use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime};

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// The start of the calendar day after `now`, in the same civil frame.
#[must_use]
pub fn next_midnight(now: NaiveDateTime) -> Option<NaiveDateTime> {
    now.date()
        .succ_opt()
        .map(|tomorrow| tomorrow.and_time(NaiveTime::MIN))
}

/// Time from `now` until the next wall-clock midnight.
///
/// Computed as `(date(now) + 1 day, 00:00:00) - now` on civil time, so the
/// result is always in `(0, 24h]` regardless of UTC offset changes on the
/// day itself. Exactly midnight yields a full day.
#[must_use]
pub fn compute_delay(now: NaiveDateTime) -> Duration {
    next_midnight(now)
        .and_then(|target| (target - now).to_std().ok())
        .unwrap_or(ONE_DAY)
}

/// [`compute_delay`] for the process's local timezone, sampled now.
#[must_use]
pub fn delay_until_next_local_midnight() -> Duration {
    compute_delay(Local::now().naive_local())
}
