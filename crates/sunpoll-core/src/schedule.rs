//! Wake-up schedule: one minute past every quarter hour.

use chrono::{DateTime, Duration, TimeZone, Timelike};

/// Next wake instant after `now`.
///
/// Lands on minute 1, 16, 31 or 46 of the local hour with zero seconds,
/// at least one minute after `now`.
pub fn next_wake<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let delay = 16 - i64::from(now.minute() % 15);
    let wake = now.clone() + Duration::minutes(delay);
    let sub_minute = Duration::seconds(i64::from(wake.second()))
        + Duration::nanoseconds(i64::from(wake.nanosecond()));
    wake - sub_minute
}

/// How long to sleep from `now` until `wake`. Zero if `wake` has passed.
pub fn until<Tz: TimeZone>(now: &DateTime<Tz>, wake: &DateTime<Tz>) -> std::time::Duration {
    wake.clone()
        .signed_duration_since(now.clone())
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}
