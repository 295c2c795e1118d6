//! Reconnect scheduling with jittered exponential back-off.
//!
//! A [`ReconnectSchedule`] owns its own attempt count rather than taking one
//! from the caller: the runtime calls [`ReconnectSchedule::next_delay`] each
//! time a connection drops and [`ReconnectSchedule::reset`] each time one
//! comes back up, and the schedule tracks where it is in the curve.

use std::time::Duration;

/// How long to wait before the next reconnect attempt, growing
/// geometrically up to `ceiling` and resetting whenever a connection
/// succeeds.
#[derive(Debug, Clone)]
pub struct ReconnectSchedule {
    /// Delay before the very first reconnect attempt.
    pub base_delay: Duration,
    /// Upper bound on the delay, no matter how long the failure streak runs.
    pub ceiling: Duration,
    /// Growth applied to the delay after each failed attempt.
    pub multiplier: f64,
    /// Stop reconnecting after this many consecutive failures. `None` means
    /// retry forever.
    pub retry_limit: Option<u32>,
    attempt: u32,
}

impl Default for ReconnectSchedule {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            ceiling: Duration::from_secs(60),
            multiplier: 2.0,
            retry_limit: None,
            attempt: 0,
        }
    }
}

impl ReconnectSchedule {
    /// How many consecutive failures the schedule has recorded since the
    /// last [`reset`](Self::reset).
    pub fn attempts_made(&self) -> u32 {
        self.attempt
    }

    /// Returns the delay to wait before the next connection attempt and
    /// advances the internal failure count.
    pub fn next_delay(&mut self) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let grown_ms = base_ms * self.multiplier.powi(self.attempt as i32);
        let capped_ms = grown_ms.min(self.ceiling.as_millis() as f64);

        // ~25% jitter so a fleet of clients that all dropped at once don't
        // all come back on the same tick.
        let jitter = capped_ms * 0.25 * jitter_fraction(self.attempt);
        self.attempt += 1;
        Duration::from_millis((capped_ms + jitter) as u64)
    }

    /// Clears the failure streak. Call this once a connection succeeds so
    /// the next drop starts back at `base_delay`.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Whether the schedule has used up its retry budget.
    pub fn exhausted(&self) -> bool {
        matches!(self.retry_limit, Some(limit) if self.attempt >= limit)
    }
}

/// A single xorshift round seeded from the attempt number. Not
/// cryptographically meaningful, just enough spread to break up a
/// reconnect storm.
fn jitter_fraction(attempt: u32) -> f64 {
    let mut x = attempt.wrapping_add(0x9E37_79B9);
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    (x as f64) / (u32::MAX as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_values() {
        let s = ReconnectSchedule::default();
        assert_eq!(s.base_delay, Duration::from_secs(1));
        assert_eq!(s.ceiling, Duration::from_secs(60));
        assert_eq!(s.retry_limit, None);
        assert_eq!(s.attempts_made(), 0);
    }

    #[test]
    fn delay_grows_across_successive_calls() {
        let mut s = ReconnectSchedule::default();
        let d0 = s.next_delay();
        let d1 = s.next_delay();
        let d2 = s.next_delay();
        assert!(d1 > d0);
        assert!(d2 > d1);
        assert_eq!(s.attempts_made(), 3);
    }

    #[test]
    fn delay_stays_at_ceiling_once_reached() {
        let mut s = ReconnectSchedule {
            base_delay: Duration::from_secs(10),
            ceiling: Duration::from_secs(30),
            multiplier: 10.0,
            retry_limit: None,
            attempt: 10,
        };
        let d = s.next_delay();
        assert!(d <= Duration::from_millis(37_500));
    }

    #[test]
    fn reset_replays_the_same_delay_as_a_fresh_schedule() {
        let mut s = ReconnectSchedule::default();
        s.next_delay();
        s.next_delay();
        s.reset();
        assert_eq!(s.attempts_made(), 0);
        let after_reset = s.next_delay();
        let fresh = ReconnectSchedule::default().next_delay();
        assert_eq!(after_reset, fresh);
    }

    #[test]
    fn exhausted_once_limit_reached() {
        let mut s = ReconnectSchedule {
            retry_limit: Some(3),
            ..Default::default()
        };
        assert!(!s.exhausted());
        s.next_delay();
        s.next_delay();
        s.next_delay();
        assert!(s.exhausted());
    }

    #[test]
    fn unlimited_never_exhausts() {
        let mut s = ReconnectSchedule::default();
        for _ in 0..1000 {
            s.next_delay();
        }
        assert!(!s.exhausted());
    }
}
