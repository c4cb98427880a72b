//! Session countdown derived from a server-issued expiry.
//!
//! A client that knows `expiresAt` drives [`SessionCountdown::tick`] once a
//! second. Each warning fires once, inside a short window below its
//! threshold, so a countdown started late does not replay old warnings.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Remaining time at which the first warning fires.
pub const FIVE_MINUTE_WARNING_MS: i64 = 5 * 60 * 1000;

/// Remaining time at which the second warning fires.
pub const ONE_MINUTE_WARNING_MS: i64 = 60 * 1000;

/// Width of the window below each threshold in which a warning may fire.
pub const WARNING_WINDOW_MS: i64 = 5 * 1000;

/// Tick period used by [`run_countdown`].
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CountdownEvent {
    FiveMinuteWarning,
    OneMinuteWarning,
    Expired,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownTick {
    pub remaining_ms: i64,
    pub events: Vec<CountdownEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionCountdown {
    expires_at: Option<DateTime<Utc>>,
    logged_in: bool,
    warned_five: bool,
    warned_one: bool,
    expired: bool,
}

impl SessionCountdown {
    pub fn new(expires_at: Option<DateTime<Utc>>, logged_in: bool) -> Self {
        Self {
            expires_at,
            logged_in,
            ..Self::default()
        }
    }

    /// Update the session; one-shot flags reset when anything changes.
    pub fn set_session(&mut self, expires_at: Option<DateTime<Utc>>, logged_in: bool) {
        if self.expires_at != expires_at || self.logged_in != logged_in {
            *self = Self::new(expires_at, logged_in);
        }
    }

    pub fn is_active(&self) -> bool {
        self.logged_in && self.expires_at.is_some()
    }

    pub fn remaining_ms_at(&self, now: DateTime<Utc>) -> i64 {
        match self.expires_at {
            Some(expires_at) if self.logged_in => (expires_at - now).num_milliseconds().max(0),
            _ => 0,
        }
    }

    /// Recompute the remaining time and collect events due at `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> CountdownTick {
        let mut events = Vec::new();
        if !self.is_active() {
            return CountdownTick {
                remaining_ms: 0,
                events,
            };
        }

        let remaining = self.remaining_ms_at(now);

        if !self.warned_five && in_window(remaining, FIVE_MINUTE_WARNING_MS) {
            self.warned_five = true;
            events.push(CountdownEvent::FiveMinuteWarning);
        }
        if !self.warned_one && in_window(remaining, ONE_MINUTE_WARNING_MS) {
            self.warned_one = true;
            events.push(CountdownEvent::OneMinuteWarning);
        }
        if !self.expired && remaining == 0 {
            self.expired = true;
            events.push(CountdownEvent::Expired);
        }

        CountdownTick {
            remaining_ms: remaining,
            events,
        }
    }

    pub fn has_expired(&self) -> bool {
        self.expired
    }
}

fn in_window(remaining: i64, threshold: i64) -> bool {
    remaining <= threshold && remaining > threshold - WARNING_WINDOW_MS
}

/// Render milliseconds as `MM:SS`; zero or less is `00:00`.
pub fn format_remaining(ms: i64) -> String {
    if ms <= 0 {
        return "00:00".to_string();
    }
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

/// Tick once per second until the session expires.
///
/// `on_event` receives every event with the remaining time; `on_expired`
/// runs exactly once when the countdown reaches zero.
pub async fn run_countdown<E, X, Fut>(mut countdown: SessionCountdown, mut on_event: E, on_expired: X)
where
    E: FnMut(CountdownEvent, i64),
    X: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    if !countdown.is_active() {
        return;
    }

    let mut interval = tokio::time::interval(TICK_INTERVAL);
    loop {
        interval.tick().await;
        let tick = countdown.tick(Utc::now());
        for event in &tick.events {
            on_event(*event, tick.remaining_ms);
        }
        if countdown.has_expired() {
            on_expired().await;
            return;
        }
    }
}
