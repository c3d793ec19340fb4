use crate::config::ClientConfig;
use std::time::Duration;
use tokio::time::Instant;

/// How long a gated request waits for the model before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub max_polls: u32,
}

impl WaitPolicy {
    pub fn new(interval: Duration, max_polls: u32) -> Self {
        Self {
            interval,
            max_polls: max_polls.max(1),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.status_poll_interval(), config.max_status_polls)
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_polls
    }

    /// Wall-clock bound covering `max_polls` ticks even when every request fails.
    /// Half an interval of slack lets the last tick land before the deadline.
    pub fn deadline_from(&self, started: Instant) -> Instant {
        let total = self.interval.saturating_mul(self.max_polls);
        started + total + self.interval / 2
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_after_max_polls() {
        let policy = WaitPolicy::new(Duration::from_secs(1), 3);
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
    }

    #[test]
    fn zero_polls_is_raised_to_one() {
        assert_eq!(WaitPolicy::new(Duration::from_secs(1), 0).max_polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_sits_between_last_tick_and_the_next() {
        let policy = WaitPolicy::new(Duration::from_secs(2), 5);
        let start = Instant::now();
        assert_eq!(policy.deadline_from(start) - start, Duration::from_secs(11));
    }
}
