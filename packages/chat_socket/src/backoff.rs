use std::time::Duration;

/// Reconnect attempts allowed after consecutive failures.
pub const MAX_RETRIES: u32 = 5;

const BASE_DELAY: Duration = Duration::from_millis(1000);
const MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Exponential reconnect schedule with a retry ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: BASE_DELAY,
            max_delay: MAX_DELAY,
            max_retries: MAX_RETRIES,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the next reconnect, or `None` once retries are exhausted.
    pub fn delay_for(&self, retry_count: u32) -> Option<Duration> {
        if retry_count >= self.max_retries {
            return None;
        }
        let factor = 2u32.saturating_pow(retry_count);
        Some(self.base.saturating_mul(factor).min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u128> = (0..5)
            .map(|n| policy.delay_for(n).unwrap().as_millis())
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
        assert!(policy.delay_for(5).is_none());
        assert!(policy.delay_for(6).is_none());
    }

    #[test]
    fn test_capped_at_max_delay() {
        let policy = BackoffPolicy {
            max_retries: 10,
            ..Default::default()
        };
        assert_eq!(policy.delay_for(5), Some(Duration::from_millis(30_000)));
        assert_eq!(policy.delay_for(9), Some(Duration::from_millis(30_000)));
    }

    #[test]
    fn test_huge_retry_count_saturates() {
        let policy = BackoffPolicy {
            max_retries: u32::MAX,
            ..Default::default()
        };
        assert_eq!(policy.delay_for(200), Some(policy.max_delay));
    }

    #[test]
    fn test_zero_retries_never_reconnects() {
        let policy = BackoffPolicy {
            max_retries: 0,
            ..Default::default()
        };
        assert!(policy.delay_for(0).is_none());
    }
}
