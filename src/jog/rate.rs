//! Minimum wall-clock spacing between emitted motion commands.
//!
//! The input poll tick runs much faster than the link should be driven; this
//! gate is what keeps a 10 ms poll loop from flooding a 200 ms command
//! cadence. Pure over the `Instant` passed in, so tests need no clock.

use std::time::Duration;

use tokio::time::Instant;

pub struct RateLimiter {
    interval: Duration,
    last_emitted: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        RateLimiter {
            interval,
            last_emitted: None,
        }
    }

    /// True when enough time has passed since the last emission. The caller
    /// records the emission with [`RateLimiter::mark_emitted`] only after a
    /// successful send.
    pub fn should_emit(&self, now: Instant) -> bool {
        match self.last_emitted {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        }
    }

    pub fn mark_emitted(&mut self, now: Instant) {
        self.last_emitted = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_emission_is_always_allowed() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        assert!(limiter.should_emit(Instant::now()));
    }

    #[test]
    fn gate_opens_exactly_at_the_interval() {
        let mut limiter = RateLimiter::new(Duration::from_millis(200));
        let t0 = Instant::now();
        limiter.mark_emitted(t0);
        assert!(!limiter.should_emit(t0 + Duration::from_millis(199)));
        assert!(limiter.should_emit(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn fast_ticks_cannot_exceed_one_emission_per_window() {
        let mut limiter = RateLimiter::new(Duration::from_millis(200));
        let t0 = Instant::now();
        let mut emitted = 0;
        // A second of 10 ms poll ticks.
        for tick in 0..100 {
            let now = t0 + Duration::from_millis(10 * tick);
            if limiter.should_emit(now) {
                limiter.mark_emitted(now);
                emitted += 1;
            }
        }
        assert_eq!(emitted, 5);
    }
}
