//! Exponential backoff with additive jitter.

use std::time::Duration;

use rand::Rng;

/// Exponents above this already exceed any sensible ceiling.
const MAX_BACKOFF_EXPONENT: u32 = 32;

/// Retry delay policy: `min(max_delay, base_delay * 2^n) + jitter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Jitter is drawn uniformly from `0..=max_jitter`.
    pub max_jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            max_jitter: Duration::from_millis(500),
        }
    }
}

impl BackoffPolicy {
    /// Delay without jitter after `prior_failures` earlier failures.
    #[must_use]
    pub fn capped_delay(&self, prior_failures: u32) -> Duration {
        let base_millis = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_millis = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);

        let exponent = prior_failures.min(MAX_BACKOFF_EXPONENT);
        let multiplier = 2_u64.saturating_pow(exponent);
        let delay_millis = base_millis.saturating_mul(multiplier).min(max_millis);

        Duration::from_millis(delay_millis)
    }

    /// Full delay, including a random jitter drawn from `rng`.
    pub fn delay<R: Rng + ?Sized>(&self, prior_failures: u32, rng: &mut R) -> Duration {
        let jitter_millis = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_millis == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng.gen_range(0..=jitter_millis))
        };

        self.capped_delay(prior_failures).saturating_add(jitter)
    }
}
