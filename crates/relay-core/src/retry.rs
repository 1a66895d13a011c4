use std::time::Duration;

use tokio_retry::strategy::ExponentialBackoff;

/// Attempt budget and exponential backoff for outbound HTTP calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per logical call, including the first.
    pub attempts: usize,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delays between attempts: `base, 2*base, 4*base, ...` capped at `max_delay`.
    pub fn backoff(&self) -> impl Iterator<Item = Duration> {
        // ExponentialBackoff yields `2^n * factor` milliseconds.
        let factor = (self.base_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .take(self.attempts.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_secs(2), Duration::from_secs(10));
        let delays: Vec<_> = policy.backoff().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(10),
            ]
        );
    }

    #[test]
    fn three_attempts_means_two_waits() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(
            policy.backoff().collect::<Vec<_>>(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }
}
