//! Window arithmetic

/// Start of the fixed window containing `now` (unix seconds)
pub fn window_start(now: i64, window_secs: i64) -> i64 {
    if window_secs <= 0 {
        return now;
    }
    now.div_euclid(window_secs) * window_secs
}

/// Seconds until the window containing `now` ends
pub fn reset_after(now: i64, window_secs: i64) -> u64 {
    let end = window_start(now, window_secs) + window_secs.max(1);
    u64::try_from(end - now).unwrap_or(0)
}

/// Saturating conversion for counter amounts
pub(super) fn to_amount(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(super) fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
