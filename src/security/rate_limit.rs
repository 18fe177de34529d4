//! Rate limiting for flood protection.
//!
//! OSCAR rate limiting is an exponential moving average over the gaps
//! between a client's sends. Each send folds the time since the previous
//! send into a per-class level; fast senders drag the level down through a
//! ladder of thresholds (alert, limited, disconnect), idle time lets it
//! float back up toward the class maximum.
//!
//! # Architecture
//!
//! The evaluation step is a pure function over `(class, last_time, now,
//! current_level, limited_now)`. All mutable state lives in
//! [`RateClassState`], owned by the session; this module never touches a
//! clock or a lock itself, which keeps the threshold ladder directly
//! testable.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Where a class level currently sits on the threshold ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitStatus {
    /// Comfortably above every threshold.
    #[default]
    Clear,
    /// Close enough to the limit that the client should be warned.
    Alert,
    /// Sends in this class are being refused.
    Limited,
    /// Flooding hard enough to forfeit the connection.
    Disconnect,
}

/// Static parameters for one rate class.
///
/// Thresholds are EMA levels in milliseconds of average send gap and are
/// ordered `disconnect < limit < alert < clear < max`. Five classes exist
/// per session, with `id` in 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateClass {
    pub id: u16,
    pub window_size: i64,
    pub clear_level: i64,
    pub alert_level: i64,
    pub limit_level: i64,
    pub disconnect_level: i64,
    pub max_level: i64,
}

/// Mutable runtime state layered over a [`RateClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateClassState {
    pub class: RateClass,
    pub current_level: i64,
    pub last_time: DateTime<Utc>,
    pub current_status: RateLimitStatus,
    /// Whether the owning session asked to be told about changes to this
    /// class.
    pub subscribed: bool,
    /// Sticky limited flag backing the hysteresis rule.
    pub limited_now: bool,
}

impl RateClassState {
    /// Fresh state: clear, level at the class maximum.
    pub fn new(class: RateClass, now: DateTime<Utc>) -> Self {
        Self {
            class,
            current_level: class.max_level,
            last_time: now,
            current_status: RateLimitStatus::Clear,
            subscribed: false,
            limited_now: false,
        }
    }
}

/// One EMA step. Pure; the caller owns all state updates.
///
/// Returns the status the new level lands on and the new level itself.
/// Once a class is limited it stays limited until the level climbs back
/// past `clear_level`, so a client hovering at the limit boundary does not
/// flap between limited and alert.
pub fn evaluate(
    class: &RateClass,
    last_time: DateTime<Utc>,
    now: DateTime<Utc>,
    current_level: i64,
    limited_now: bool,
) -> (RateLimitStatus, i64) {
    let gap = (now - last_time).num_milliseconds().max(0);

    let new_level = ((current_level * (class.window_size - 1) + gap) / class.window_size)
        .clamp(0, class.max_level);

    let status = if new_level <= class.disconnect_level {
        RateLimitStatus::Disconnect
    } else if new_level <= class.limit_level {
        RateLimitStatus::Limited
    } else if limited_now && new_level < class.clear_level {
        RateLimitStatus::Limited
    } else if new_level <= class.alert_level {
        RateLimitStatus::Alert
    } else {
        RateLimitStatus::Clear
    };

    (status, new_level)
}
