//! Exponential backoff for worker reconnect attempts. Grounded on
//! `orca::executor::retry::RetryConfig` (`max_retries`, `initial_delay_secs`,
//! `max_delay_secs`, `multiplier`), with `max_retries` reinterpreted here as
//! an uncapped reconnect loop's backoff ceiling rather than a hard attempt
//! limit, since a lost worker must eventually be retried forever.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the `attempt`'th reconnect (0-indexed).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_then_caps() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(0), Duration::from_millis(500));
        assert_eq!(config.delay_for(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for(10), config.max_delay);
    }
}
