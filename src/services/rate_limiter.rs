use chrono::{DateTime, Duration, Utc};

use crate::config::RateLimitConfig;
use crate::models::RateLimitStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitWindow {
    pub hour_count: u32,
    pub minute_count: u32,
    pub hour_reset_at: DateTime<Utc>,
    pub minute_reset_at: DateTime<Utc>,
}

/// Fixed hour/minute call windows for the upstream provider.
///
/// Windows roll over lazily on access. A rolled window restarts at `now`,
/// not at the previous reset time, so idle periods never leave a backlog.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    window: RateLimitWindow,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, now: DateTime<Utc>) -> Self {
        Self {
            config,
            window: RateLimitWindow {
                hour_count: 0,
                minute_count: 0,
                hour_reset_at: now + Duration::hours(1),
                minute_reset_at: now + Duration::minutes(1),
            },
        }
    }

    /// Take one call from both windows. Returns false (and counts nothing)
    /// when either window is exhausted.
    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> bool {
        self.roll_over(now);

        if self.window.hour_count >= self.config.max_per_hour
            || self.window.minute_count >= self.config.max_per_minute
        {
            tracing::warn!(
                "Rate limit reached ({}/{} this hour, {}/{} this minute)",
                self.window.hour_count,
                self.config.max_per_hour,
                self.window.minute_count,
                self.config.max_per_minute
            );
            return false;
        }

        self.window.hour_count += 1;
        self.window.minute_count += 1;
        true
    }

    fn roll_over(&mut self, now: DateTime<Utc>) {
        if now >= self.window.hour_reset_at {
            self.window.hour_count = 0;
            self.window.hour_reset_at = now + Duration::hours(1);
        }
        if now >= self.window.minute_reset_at {
            self.window.minute_count = 0;
            self.window.minute_reset_at = now + Duration::minutes(1);
        }
    }

    /// Calls left in the (hour, minute) windows as of `now`.
    pub fn remaining(&self, now: DateTime<Utc>) -> (u32, u32) {
        let hour_used = if now >= self.window.hour_reset_at { 0 } else { self.window.hour_count };
        let minute_used = if now >= self.window.minute_reset_at { 0 } else { self.window.minute_count };
        (
            self.config.max_per_hour.saturating_sub(hour_used),
            self.config.max_per_minute.saturating_sub(minute_used),
        )
    }

    /// Time until the (hour, minute) windows reset; zero once due.
    pub fn reset_eta(&self, now: DateTime<Utc>) -> (Duration, Duration) {
        let until = |at: DateTime<Utc>| (at - now).max(Duration::zero());
        (until(self.window.hour_reset_at), until(self.window.minute_reset_at))
    }

    pub fn status(&self, now: DateTime<Utc>) -> RateLimitStatus {
        let (remaining_hour, remaining_minute) = self.remaining(now);
        let (hour_eta, minute_eta) = self.reset_eta(now);
        RateLimitStatus {
            remaining_hour,
            remaining_minute,
            hour_reset_in_seconds: hour_eta.num_seconds(),
            minute_reset_in_seconds: minute_eta.num_seconds(),
        }
    }

    #[cfg(test)]
    pub fn window(&self) -> &RateLimitWindow {
        &self.window
    }
}
