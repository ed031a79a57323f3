use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CapacityExhaustion, RateLimitState};

/// Status code the service uses for both rate-window and concurrency exhaustion.
pub const DEFAULT_RESPONSE_CODE: u16 = 409;

/// How the executor reacts to capacity signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Status code signalling capacity exhaustion.
    pub response_code: u16,
    /// Total physical attempts tolerated for a rate-limited request.
    pub max_attempts: u32,
    /// Cool down once `limit_remaining` drops to this many requests.
    pub reserve_limit: u32,
    /// Pause applied while the window is within the reserve.
    #[serde(with = "humantime_serde")]
    pub cooldown_period: Duration,
    /// Extra pause after a concurrency (rather than rate-window) rejection. The server gives no
    /// wait hint for those.
    #[serde(with = "humantime_serde")]
    pub concurrency_cooldown: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            response_code: DEFAULT_RESPONSE_CODE,
            max_attempts: 5,
            reserve_limit: 30,
            cooldown_period: Duration::from_secs(1),
            concurrency_cooldown: Duration::from_secs(5),
        }
    }
}

impl RateLimitConfig {
    /// Wait required before the next request given the latest `state`.
    ///
    /// The larger of the server's wait instruction and the reserve cooldown.
    pub fn delay_before(&self, state: &RateLimitState) -> Duration {
        let server_wait = Duration::from_secs(u64::from(state.to_wait_seconds));
        let reserve = if state.limit_remaining <= self.reserve_limit {
            self.cooldown_period
        } else {
            Duration::ZERO
        };
        server_wait.max(reserve)
    }

    /// Pause specific to the kind of exhaustion reported, on top of [`Self::delay_before`].
    pub fn exhaustion_pause(&self, exhaustion: CapacityExhaustion) -> Duration {
        match exhaustion {
            CapacityExhaustion::Concurrency => self.concurrency_cooldown,
            CapacityExhaustion::RateWindow | CapacityExhaustion::Unspecified => Duration::ZERO,
        }
    }
}
