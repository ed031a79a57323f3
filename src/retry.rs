//! Retry policy for unexpected request failures.
//!
//! Semantics:
//! - `max_attempts` counts total attempts (initial try + retries).
//! - Only errors accepted by [`ClientError::is_retryable`] are retried: transport failures and
//!   HTTP errors whose status is not listed in `no_retry`. Everything else, including capacity
//!   exhaustion which has its own attempt counter, returns immediately.
//! - Backoff doubles per retry up to `max_delay`, optionally jittered.
//! - Sleeper controls how delays are applied (production uses `TokioSleeper`; tests inject
//!   `InstantSleeper`/`TrackingSleeper`).
//!
//! Invariants:
//! - Attempts never exceed `max_attempts`.
//! - A `Retry` event is emitted before every sleep, so `max_attempts - 1` at most.
//!
//! ```rust
//! use std::time::Duration;
//! use qualys_client::error::{ClientError, TransportError};
//! use qualys_client::retry::RetryPolicy;
//! use qualys_client::sleeper::InstantSleeper;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .with_sleeper(InstantSleeper)
//!     .build()
//!     .unwrap();
//! let result: Result<(), ClientError> = policy
//!     .execute(|| async {
//!         Err(TransportError::Connection { url: "u".into(), message: "reset".into() }.into())
//!     })
//!     .await;
//! assert!(matches!(result, Err(ClientError::RetryExhausted { attempts: 3, .. })));
//! # });
//! ```

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::error::ClientError;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::telemetry::{ClientEvent, ClientRetryEvent, EventBus};

/// How unexpected failures are retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, initial try included.
    pub max_attempts: u32,
    /// HTTP statuses that fail on first occurrence.
    pub no_retry: Vec<u16>,
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            no_retry: vec![400, 401, 403],
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

/// Retry policy combining backoff, the retryable-status filter, events and a sleeper.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    no_retry: Arc<[u16]>,
    backoff: Backoff,
    bus: Option<EventBus>,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("no_retry", &self.no_retry)
            .field("backoff", &self.backoff)
            .field("sleeper", &"<sleeper>")
            .finish()
    }
}

impl RetryPolicy {
    /// Construct a new builder with defaults.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Builder seeded from `config`.
    pub fn from_config(config: &RetryConfig) -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
            .max_attempts(config.max_attempts)
            .no_retry(config.no_retry.iter().copied())
            .backoff(Backoff::new(config.base_delay, config.max_delay).with_jitter(config.jitter))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Execute an async operation with retry semantics.
    pub async fn execute<T, Fut, Op>(&self, mut operation: Op) -> Result<T, ClientError>
    where
        Fut: Future<Output = Result<T, ClientError>>,
        Op: FnMut() -> Fut,
    {
        let mut attempt = 1;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !error.is_retryable(&self.no_retry) {
                return Err(error);
            }
            if attempt >= self.max_attempts {
                return Err(ClientError::RetryExhausted { attempts: attempt, last: Box::new(error) });
            }

            let delay = self.backoff.jittered_delay(attempt);
            if let Some(bus) = &self.bus {
                bus.emit(ClientEvent::Retry(ClientRetryEvent {
                    attempt,
                    max_attempts: self.max_attempts,
                    delay,
                    error: error.to_string(),
                }));
            }
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Builder for `RetryPolicy`.
pub struct RetryPolicyBuilder {
    max_attempts: u32,
    no_retry: Vec<u16>,
    backoff: Backoff,
    bus: Option<EventBus>,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryPolicyBuilder {
    /// Create a builder with the [`RetryConfig`] defaults.
    pub fn new() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            no_retry: defaults.no_retry,
            backoff: Backoff::new(defaults.base_delay, defaults.max_delay),
            bus: None,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Set total attempts (initial + retries). Must be > 0.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Statuses that are never retried.
    pub fn no_retry(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.no_retry = statuses.into_iter().collect();
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Publish a `Retry` event on `bus` before each backoff.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn with_shared_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Build the retry policy, validating inputs.
    pub fn build(self) -> Result<RetryPolicy, ClientError> {
        if self.max_attempts == 0 {
            return Err(ClientError::Config("retry max_attempts must be > 0".into()));
        }
        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            no_retry: self.no_retry.into(),
            backoff: self.backoff,
            bus: self.bus,
            sleeper: self.sleeper,
        })
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
