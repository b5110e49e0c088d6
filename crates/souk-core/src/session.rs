//! Sale session: one timed selling round for one item.
//!
//! The countdown is derived from wall-clock elapsed time rather than a
//! naive tick counter, so it stays correct under scheduling jitter. The
//! ten-second warning uses a threshold crossing (`left <= 10`), not an
//! equality check, so a tick that skips past the mark still fires it, and
//! the `warned` latch guarantees it fires at most once per session.

use std::time::{Duration, Instant};

/// Default sale window in seconds.
pub const SALE_DURATION_SECS: u64 = 60;

/// Remaining seconds at which the one-time warning is broadcast.
pub const WARNING_THRESHOLD_SECS: u64 = 10;

/// A single timed selling round for one item.
///
/// Exactly one session exists at a time per seller node; the market holds
/// it as `Option<SaleSession>` and drops it when the round ends.
#[derive(Debug, Clone)]
pub struct SaleSession {
    item: String,
    started_at: Instant,
    duration: Duration,
    warned: bool,
}

impl SaleSession {
    /// Start a session for `item` at `now`, lasting `duration`.
    pub fn new(item: impl Into<String>, now: Instant, duration: Duration) -> Self {
        Self { item: item.into(), started_at: now, duration, warned: false }
    }

    /// The item this session is selling.
    pub fn item(&self) -> &str {
        &self.item
    }

    /// Whole seconds remaining at `now`, saturating at zero.
    pub fn time_left(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.started_at);
        self.duration.saturating_sub(elapsed).as_secs()
    }

    /// True once the sale window has fully elapsed.
    pub fn expired(&self, now: Instant) -> bool {
        self.time_left(now) == 0
    }

    /// Check the warning threshold, latching it.
    ///
    /// Returns `true` exactly once per session: the first time the
    /// remaining time is at or below [`WARNING_THRESHOLD_SECS`] while the
    /// session is still running.
    pub fn take_warning(&mut self, now: Instant) -> bool {
        let left = self.time_left(now);
        if !self.warned && left > 0 && left <= WARNING_THRESHOLD_SECS {
            self.warned = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(duration_secs: u64) -> (SaleSession, Instant) {
        let t0 = Instant::now();
        (SaleSession::new("flower", t0, Duration::from_secs(duration_secs)), t0)
    }

    #[test]
    fn time_left_tracks_elapsed_wall_clock() {
        let (session, t0) = session(60);
        assert_eq!(session.time_left(t0), 60);
        assert_eq!(session.time_left(t0 + Duration::from_secs(12)), 48);
        assert_eq!(session.time_left(t0 + Duration::from_secs(60)), 0);
        assert_eq!(session.time_left(t0 + Duration::from_secs(90)), 0);
    }

    #[test]
    fn expiry_at_window_end() {
        let (session, t0) = session(60);
        assert!(!session.expired(t0 + Duration::from_secs(59)));
        assert!(session.expired(t0 + Duration::from_secs(60)));
    }

    #[test]
    fn warning_fires_once_at_threshold() {
        let (mut session, t0) = session(60);
        assert!(!session.take_warning(t0 + Duration::from_secs(45)));
        assert!(session.take_warning(t0 + Duration::from_secs(50)));
        assert!(!session.take_warning(t0 + Duration::from_secs(51)));
        assert!(!session.take_warning(t0 + Duration::from_secs(55)));
    }

    #[test]
    fn warning_fires_even_when_ticks_skip_the_mark() {
        // Jittery ticker: jumps from 15s left straight to 3s left.
        let (mut session, t0) = session(60);
        assert!(!session.take_warning(t0 + Duration::from_secs(45)));
        assert!(session.take_warning(t0 + Duration::from_secs(57)));
    }

    #[test]
    fn no_warning_after_expiry() {
        let (mut session, t0) = session(60);
        assert!(!session.take_warning(t0 + Duration::from_secs(60)));
        assert!(!session.take_warning(t0 + Duration::from_secs(120)));
    }

    #[test]
    fn short_sessions_warn_immediately() {
        let (mut session, t0) = session(8);
        assert!(session.take_warning(t0 + Duration::from_secs(1)));
        assert!(!session.take_warning(t0 + Duration::from_secs(2)));
    }
}
