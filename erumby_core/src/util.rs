//! Common time/period helpers for erumby_core.

use std::time::Duration;

/// Number of whole ticks in `dead_time_ms`, or `None` when the dead time is
/// not an exact multiple of the period (or the period is zero).
#[inline]
pub fn delay_ticks(dead_time_ms: u32, period_ms: u32) -> Option<usize> {
    if period_ms == 0 || dead_time_ms % period_ms != 0 {
        return None;
    }
    usize::try_from(dead_time_ms / period_ms).ok()
}

#[inline]
pub fn saturating_us(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}
