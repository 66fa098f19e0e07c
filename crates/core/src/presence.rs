//! Online/offline classification derived from the last contact time.
//!
//! Presence is never stored. Callers recompute it for every response from
//! the device's `last_seen` and the current clock.

use chrono::Duration;

use crate::types::Timestamp;

/// Trailing window within which a device counts as online.
pub const PRESENCE_WINDOW_SECS: i64 = 5 * 60;

/// The default presence window as a [`Duration`].
pub fn presence_window() -> Duration {
    Duration::seconds(PRESENCE_WINDOW_SECS)
}

/// `true` iff `now - last_seen <= window`.
pub fn is_online_within(last_seen: Timestamp, now: Timestamp, window: Duration) -> bool {
    now.signed_duration_since(last_seen) <= window
}

/// `true` iff the device was seen within the last five minutes.
pub fn is_online(last_seen: Timestamp, now: Timestamp) -> bool {
    is_online_within(last_seen, now, presence_window())
}
