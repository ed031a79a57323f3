//! Exponential backoff for transport retries.
//!
//! Capacity exhaustion does not use this module: those waits come from the server's
//! `X-RateLimit-ToWait-Sec` header. Backoff only spaces out retries of *unexpected* failures.
//!
//! Attempt semantics: attempt `0` is the initial call (no delay); retries start at `1`.
//!
//! ```rust
//! use std::time::Duration;
//! use qualys_client::Backoff;
//!
//! let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5)).without_jitter();
//! assert_eq!(backoff.delay(0), Duration::ZERO);
//! assert_eq!(backoff.delay(1), Duration::from_secs(1));
//! assert_eq!(backoff.delay(3), Duration::from_secs(4));
//! assert_eq!(backoff.delay(4), Duration::from_secs(5)); // capped
//! ```

use rand::{rng, Rng};
use std::time::Duration;

/// Ceiling applied when the doubling would overflow (1 hour).
pub const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

/// Doubling backoff with a cap and optional equal jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: bool,
}

impl Backoff {
    /// `max` below `base` is raised to `base`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max: max.max(base).min(MAX_BACKOFF), jitter: true }
    }

    /// Disable jitter; delays become deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Un-jittered delay before retry number `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let multiplier = 2u128.saturating_pow(attempt - 1);
        let nanos = self.base.as_nanos().saturating_mul(multiplier).min(self.max.as_nanos());
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Delay to actually sleep: with jitter, uniform in `[delay/2, delay]` so retries from
    /// concurrent batches do not line up.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay(attempt);
        if !self.jitter {
            return delay;
        }
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 {
            return delay;
        }
        Duration::from_millis(rng().random_range(millis / 2..=millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1)).without_jitter();
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
        assert_eq!(backoff.delay(5), Duration::from_secs(1));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_half_window() {
        let backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(30));
        for _ in 0..50 {
            let d = backoff.jittered_delay(2);
            assert!(d >= Duration::from_secs(2) && d <= Duration::from_secs(4), "{d:?}");
        }
    }

    #[test]
    fn max_below_base_is_raised() {
        let backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(1)).without_jitter();
        assert_eq!(backoff.delay(3), Duration::from_secs(5));
    }
}
