use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::rate_limit::{CapacityExhaustion, RateLimitConfig, RateLimitState};

/// Lifecycle events emitted by a client.
///
/// Every event is an immutable snapshot taken when it was emitted. They feed logging and the
/// concurrency throttler's feedback loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// A physical request is about to be sent.
    Request(ClientRequestEvent),
    /// A request is being held back to respect capacity.
    DelayedRequest(ClientDelayedRequestEvent),
    /// A physical request produced a response.
    Response(ClientResponseEvent),
    /// An unexpected failure is about to be retried.
    Retry(ClientRetryEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientRequestEvent {
    pub method: String,
    pub url: String,
    /// 1-indexed physical attempt within the logical request.
    pub attempt: u32,
    pub rate_limit_config: RateLimitConfig,
    pub rate_limit_state: RateLimitState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientDelayedRequestEvent {
    pub method: String,
    pub url: String,
    pub attempt: u32,
    pub delay: Duration,
    pub rate_limit_state: RateLimitState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientResponseEvent {
    pub method: String,
    pub url: String,
    pub attempt: u32,
    pub status: u16,
    pub status_text: String,
    pub duration: Duration,
    /// Set when the status was the configured capacity signal.
    pub exhaustion: Option<CapacityExhaustion>,
    /// State the request was sent under.
    pub rate_limit_state: RateLimitState,
    /// State derived from this response's headers.
    pub next_rate_limit_state: RateLimitState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientRetryEvent {
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    pub error: String,
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientEvent::Request(e) => {
                write!(f, "Request({} {}, attempt={})", e.method, e.url, e.attempt)
            }
            ClientEvent::DelayedRequest(e) => {
                write!(f, "DelayedRequest({} {}, delay={:?})", e.method, e.url, e.delay)
            }
            ClientEvent::Response(e) => write!(
                f,
                "Response({} {} -> {}, attempt={}, remaining={}, running={}/{})",
                e.method,
                e.url,
                e.status,
                e.attempt,
                e.next_rate_limit_state.limit_remaining,
                e.next_rate_limit_state.concurrency_running,
                e.next_rate_limit_state.concurrency
            ),
            ClientEvent::Retry(e) => write!(
                f,
                "Retry(#{}/{}, delay={:?}, error={})",
                e.attempt, e.max_attempts, e.delay, e.error
            ),
        }
    }
}
