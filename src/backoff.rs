//! Shared exponential backoff with jitter, used by the Connection Pool for
//! OPC UA reconnects and by the AAS Client for transient HTTP retries.
//!
//! The policy itself (1s start, doubling, 30s cap, ±25% jitter) is the
//! bridge's own numeric choice (spec §11); the shape — attempt counter in,
//! `Duration` out, reset on success — follows the teacher's
//! `HealthMonitor::next_backoff_delay` in `health/mod.rs`.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter_ratio: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter_ratio: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            jitter_ratio,
            attempt: 0,
        }
    }

    pub fn standard() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30), 2.0, 0.25)
    }

    /// Duration to wait before the next attempt, then advances the attempt
    /// counter. Jitter is applied symmetrically around the computed delay.
    pub fn next_delay(&mut self) -> Duration {
        let base_ms = self.initial.as_millis() as f64 * self.multiplier.powi(self.attempt as i32);
        let capped_ms = base_ms.min(self.max.as_millis() as f64);
        self.attempt = self.attempt.saturating_add(1);

        let jitter_span = capped_ms * self.jitter_ratio;
        let jittered_ms = rand::thread_rng().gen_range((capped_ms - jitter_span)..=(capped_ms + jitter_span));
        Duration::from_millis(jittered_ms.max(0.0) as u64)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(500), 2.0, 0.0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn reset_returns_to_initial_delay() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(500), 2.0, 0.0);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let mut backoff = Backoff::new(Duration::from_millis(1000), Duration::from_millis(1000), 1.0, 0.25);
        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay.as_millis() >= 750 && delay.as_millis() <= 1250);
        }
    }
}
