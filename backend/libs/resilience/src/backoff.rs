/// Exponential backoff with an attempt budget
///
/// Attempt `k` (1-based) waits `initial_backoff * backoff_multiplier^(k-1)`,
/// clamped to `max_backoff`. Once `max_attempts` delays have been handed out the
/// schedule is exhausted and stays exhausted until `reset`.
use rand::Rng;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Maximum number of reconnect attempts before giving up
    pub max_attempts: u32,
    /// Delay before the first attempt
    pub initial_backoff: Duration,
    /// Upper bound for a single delay
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add random jitter to backoff (±30%)
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl BackoffConfig {
    /// Delay for the given 1-based attempt, without jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Whether another attempt fits in the budget after `attempts_made` attempts
    pub fn allows(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Stateful attempt tracker over a [`BackoffConfig`]
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Claim the next attempt. Returns `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.config.allows(self.attempts) {
            warn!("Max reconnection attempts ({}) reached", self.config.max_attempts);
            return None;
        }

        self.attempts += 1;
        let delay = self.config.delay_for(self.attempts);
        Some(apply_jitter(delay, self.config.jitter))
    }

    /// Number of attempts claimed since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        !self.config.allows(self.attempts)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

fn apply_jitter(base: Duration, jitter: bool) -> Duration {
    if jitter {
        let mut rng = rand::thread_rng();
        let jitter_factor = 1.0 + rng.gen_range(-0.3..0.3); // ±30%
        Duration::from_millis((base.as_millis() as f64 * jitter_factor) as u64)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_per_attempt() {
        let config = BackoffConfig::default();
        assert_eq!(config.delay_for(1), Duration::from_secs(1));
        assert_eq!(config.delay_for(2), Duration::from_secs(2));
        assert_eq!(config.delay_for(3), Duration::from_secs(4));
        assert_eq!(config.delay_for(5), Duration::from_secs(16));
    }

    #[test]
    fn test_delay_clamped_to_max_backoff() {
        let config = BackoffConfig {
            max_backoff: Duration::from_secs(3),
            ..Default::default()
        };
        assert_eq!(config.delay_for(3), Duration::from_secs(3));
        assert_eq!(config.delay_for(30), Duration::from_secs(3));
    }

    #[test]
    fn test_backoff_exhausts_after_budget() {
        let mut backoff = Backoff::new(BackoffConfig {
            max_attempts: 2,
            ..Default::default()
        });

        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.attempts(), 2);
    }

    #[test]
    fn test_reset_restores_budget() {
        let mut backoff = Backoff::new(BackoffConfig {
            max_attempts: 1,
            ..Default::default()
        });
        backoff.next_delay();
        assert!(backoff.is_exhausted());

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut backoff = Backoff::new(BackoffConfig {
            jitter: true,
            initial_backoff: Duration::from_millis(1000),
            ..Default::default()
        });
        let delay = backoff.next_delay().unwrap();
        assert!(delay >= Duration::from_millis(700));
        assert!(delay <= Duration::from_millis(1300));
    }
}
