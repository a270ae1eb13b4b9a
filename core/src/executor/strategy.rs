use std::time::Duration;

use crate::error::ErrorKind;

/// Decides backoff between attempts.
pub trait RetryStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Delay before attempt `attempt + 1`, given `attempt` (1-based) failed.
    fn next_delay(&self, attempt: u32, kind: ErrorKind) -> Duration;

    fn should_retry(&self, attempt: u32, ceiling: u32, kind: ErrorKind) -> bool {
        attempt < ceiling && kind.is_recoverable()
    }
}

/// Bounds concurrency inside a parallel-eligible group.
pub trait ConcurrencyStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize;
}

#[derive(Debug, Clone)]
pub struct ConcurrencyContext {
    /// `max_parallel` from the execution options
    pub requested_max: usize,
    pub group_size: usize,
    pub available_cpus: usize,
}

/// `delay = base * 2^(attempt-1)`, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, attempt: u32, _kind: ErrorKind) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(30);
        self.base.saturating_mul(exp).min(self.max)
    }
}

/// Uses `max_parallel` as given.
#[derive(Debug, Clone, Default)]
pub struct FixedConcurrency;

impl ConcurrencyStrategy for FixedConcurrency {
    fn name(&self) -> &str {
        "fixed"
    }

    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize {
        context.requested_max.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let strategy = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_millis(1000));
        let kind = ErrorKind::InstallTransient;
        assert_eq!(strategy.next_delay(1, kind).as_millis(), 100);
        assert_eq!(strategy.next_delay(2, kind).as_millis(), 200);
        assert_eq!(strategy.next_delay(3, kind).as_millis(), 400);
        assert_eq!(strategy.next_delay(5, kind).as_millis(), 1000);
        assert_eq!(strategy.next_delay(40, kind).as_millis(), 1000);
    }

    #[test]
    fn test_should_retry_respects_ceiling_and_kind() {
        let strategy = ExponentialBackoff::new(Duration::ZERO, Duration::ZERO);
        assert!(strategy.should_retry(1, 3, ErrorKind::InstallTransient));
        assert!(!strategy.should_retry(3, 3, ErrorKind::InstallTransient));
        assert!(!strategy.should_retry(1, 3, ErrorKind::InstallPermanent));
    }

    #[test]
    fn test_fixed_concurrency() {
        let ctx = ConcurrencyContext {
            requested_max: 0,
            group_size: 4,
            available_cpus: 8,
        };
        assert_eq!(FixedConcurrency.calculate_concurrency(&ctx), 1);
    }
}
