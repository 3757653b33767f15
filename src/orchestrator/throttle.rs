//! Pacing between remote enrichment calls.
use std::time::Duration;

/// Pause inserted after each remote attempt.
pub trait Throttle {
    fn pause(&mut self);
}

/// Sleeps a fixed interval on every pause.
#[derive(Debug, Clone, Copy)]
pub struct FixedIntervalThrottle {
    interval: Duration,
}

impl FixedIntervalThrottle {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Throttle for FixedIntervalThrottle {
    fn pause(&mut self) {
        if self.interval.is_zero() {
            return;
        }
        tracing::debug!(interval_ms = self.interval.as_millis() as u64, "throttle pause");
        std::thread::sleep(self.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn zero_interval_does_not_sleep() {
        let mut throttle = FixedIntervalThrottle::from_millis(0);
        let start = Instant::now();
        throttle.pause();
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn pause_waits_at_least_the_interval() {
        let mut throttle = FixedIntervalThrottle::from_millis(20);
        let start = Instant::now();
        throttle.pause();
        assert!(start.elapsed() >= throttle.interval());
    }
}
