use std::time::Duration;

use rigup_core::config::RetryConfig;
use rigup_core::error::ErrorKind;
use rigup_core::executor::{ExponentialBackoff, RetryStrategy};

/// `delay = base * attempt`, capped at `max_delay_ms`.
pub struct LinearRetry {
    config: RetryConfig,
}

impl LinearRetry {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl RetryStrategy for LinearRetry {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, attempt: u32, _kind: ErrorKind) -> Duration {
        let delay = self
            .config
            .base_delay_ms
            .saturating_mul(u64::from(attempt.max(1)))
            .min(self.config.max_delay_ms);
        Duration::from_millis(delay)
    }
}

pub fn exponential_from_config(config: &RetryConfig) -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(config.base_delay_ms),
        Duration::from_millis(config.max_delay_ms),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(base: u64, max: u64) -> RetryConfig {
        RetryConfig {
            strategy: "linear".to_string(),
            base_delay_ms: base,
            max_delay_ms: max,
        }
    }

    #[test]
    fn test_linear_backoff() {
        let plugin = LinearRetry::new(cfg(50, 200));
        let kind = ErrorKind::InstallTransient;
        assert_eq!(plugin.next_delay(1, kind).as_millis(), 50);
        assert_eq!(plugin.next_delay(3, kind).as_millis(), 150);
        assert_eq!(plugin.next_delay(9, kind).as_millis(), 200);
    }

    #[test]
    fn test_linear_only_retries_recoverable_kinds() {
        let plugin = LinearRetry::new(cfg(0, 0));
        assert!(plugin.should_retry(1, 3, ErrorKind::VerificationFailed));
        assert!(!plugin.should_retry(1, 3, ErrorKind::InstallPermanent));
        assert!(!plugin.should_retry(3, 3, ErrorKind::InstallTransient));
    }

    #[test]
    fn test_exponential_from_config() {
        let plugin = exponential_from_config(&cfg(100, 1000));
        assert_eq!(plugin.next_delay(2, ErrorKind::InstallTransient).as_millis(), 200);
    }
}
