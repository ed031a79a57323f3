//! Rate-limit-aware execution of one logical request.
//!
//! A logical request may take several physical attempts. Before each attempt the executor
//! waits out whatever the latest [`RateLimitState`](crate::rate_limit::RateLimitState) asks for;
//! after each response it publishes the state derived from the capacity headers. A response
//! carrying the configured capacity status is repeated until
//! [`RateLimitConfig::max_attempts`] attempts were made.
//!
//! Events, per physical attempt:
//! - `DelayedRequest` whenever a wait precedes the attempt,
//! - exactly one `Request` and one `Response`.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::ClientError;
use crate::rate_limit::{RateLimitConfig, RateLimitHeaders, SharedRateLimitState};
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::telemetry::{
    ClientDelayedRequestEvent, ClientEvent, ClientRequestEvent, ClientResponseEvent, EventBus,
};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Error bodies are cut to this many bytes before they are attached to an error.
const BODY_EXCERPT_LIMIT: usize = 2048;

#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    config: RateLimitConfig,
    state: SharedRateLimitState,
    bus: EventBus,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("transport", &self.transport)
            .field("config", &self.config)
            .field("state", &self.state.get())
            .finish()
    }
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, config: RateLimitConfig) -> Self {
        Self {
            transport,
            config,
            state: SharedRateLimitState::default(),
            bus: EventBus::new(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Publish events on `bus` instead of a private one.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    /// Share the capacity snapshot with other executors of the same client.
    pub fn with_state(mut self, state: SharedRateLimitState) -> Self {
        self.state = state;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn state(&self) -> &SharedRateLimitState {
        &self.state
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Perform `request`, returning the first non-capacity response with a success status.
    ///
    /// Transport failures are returned as-is; retrying them is [`RetryPolicy`]'s job.
    ///
    /// [`RetryPolicy`]: crate::retry::RetryPolicy
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let method = request.method.to_string();
        let url = request.url.to_string();
        let mut pause = Duration::ZERO;
        let mut attempt = 1u32;

        loop {
            let state = self.state.get();
            let delay = self.config.delay_before(&state) + pause;
            if !delay.is_zero() {
                self.bus.emit(ClientEvent::DelayedRequest(ClientDelayedRequestEvent {
                    method: method.clone(),
                    url: url.clone(),
                    attempt,
                    delay,
                    rate_limit_state: state,
                }));
                self.sleeper.sleep(delay).await;
            }

            self.bus.emit(ClientEvent::Request(ClientRequestEvent {
                method: method.clone(),
                url: url.clone(),
                attempt,
                rate_limit_config: self.config,
                rate_limit_state: state,
            }));

            let started = Instant::now();
            let response = self.transport.send(request.clone()).await?;

            let headers = RateLimitHeaders::from_headers(response.headers());
            let next = self.state.publish(&state, &headers);
            let status = response.status().as_u16();
            let exhaustion = (status == self.config.response_code).then(|| headers.exhaustion());

            self.bus.emit(ClientEvent::Response(ClientResponseEvent {
                method: method.clone(),
                url: url.clone(),
                attempt,
                status,
                status_text: response.status_text().to_string(),
                duration: started.elapsed(),
                exhaustion,
                rate_limit_state: state,
                next_rate_limit_state: next,
            }));

            if let Some(kind) = exhaustion {
                if attempt >= self.config.max_attempts {
                    return Err(ClientError::RateLimitExhausted {
                        url,
                        attempts: attempt,
                        status,
                        status_text: response.status_text().to_string(),
                    });
                }
                pause = self.config.exhaustion_pause(kind);
                attempt += 1;
                continue;
            }

            if status >= 400 {
                let status_text = response.status_text();
                let mut body = response.text().await.unwrap_or_default();
                truncate(&mut body, BODY_EXCERPT_LIMIT);
                return Err(ClientError::from_status(&url, status, status_text, body));
            }

            return Ok(response);
        }
    }
}

fn truncate(text: &mut String, limit: usize) {
    if text.len() <= limit {
        return;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::CapacityExhaustion;
    use crate::sleeper::TrackingSleeper;
    use crate::transport::{ScriptedResponse, ScriptedTransport};
    use std::sync::Mutex;
    use url::Url;

    fn request() -> ApiRequest {
        ApiRequest::get(Url::parse("https://qualysapi.example.com/msp/about.php").unwrap())
    }

    fn recorded(executor: &RequestExecutor) -> (Arc<Mutex<Vec<ClientEvent>>>, crate::telemetry::Subscription) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let subscription = executor.bus().subscribe(move |event: &ClientEvent| {
            sink.lock().unwrap().push(event.clone());
        });
        (events, subscription)
    }

    #[tokio::test]
    async fn success_publishes_header_state() {
        let transport = ScriptedTransport::always(
            ScriptedResponse::ok("<ok/>")
                .header("X-RateLimit-Remaining", 250)
                .header("X-Concurrency-Limit-Running", 1),
        );
        let executor = RequestExecutor::new(Arc::new(transport), RateLimitConfig::default())
            .with_sleeper(Arc::new(TrackingSleeper::new()));
        let (events, _subscription) = recorded(&executor);

        let response = executor.execute(request()).await.unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(executor.state().get().limit_remaining, 250);
        assert_eq!(executor.state().get().concurrency_running, 1);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ClientEvent::Request(_)));
        assert!(matches!(events[1], ClientEvent::Response(ref e) if e.exhaustion.is_none()));
    }

    #[tokio::test]
    async fn rate_window_exhaustion_waits_then_succeeds() {
        let transport = ScriptedTransport::sequence(vec![
            Ok(ScriptedResponse::status(409)
                .header("X-RateLimit-Remaining", 0)
                .header("X-RateLimit-ToWait-Sec", 7)),
            Ok(ScriptedResponse::ok("<ok/>").header("X-RateLimit-Remaining", 299)),
        ]);
        let sleeper = TrackingSleeper::new();
        let executor = RequestExecutor::new(Arc::new(transport.clone()), RateLimitConfig::default())
            .with_sleeper(Arc::new(sleeper.clone()));
        let (events, _subscription) = recorded(&executor);

        executor.execute(request()).await.unwrap();

        assert_eq!(transport.request_count(), 2);
        assert_eq!(sleeper.calls(), vec![Duration::from_secs(7)]);
        let events = events.lock().unwrap();
        let kinds: Vec<_> = events
            .iter()
            .map(|e| match e {
                ClientEvent::Request(_) => "request",
                ClientEvent::DelayedRequest(_) => "delayed",
                ClientEvent::Response(_) => "response",
                ClientEvent::Retry(_) => "retry",
            })
            .collect();
        assert_eq!(kinds, ["request", "response", "delayed", "request", "response"]);
        match &events[1] {
            ClientEvent::Response(e) => {
                assert_eq!(e.exhaustion, Some(CapacityExhaustion::RateWindow));
                assert_eq!(e.next_rate_limit_state.to_wait_seconds, 7);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(executor.state().get().to_wait_seconds, 0);
    }

    #[tokio::test]
    async fn concurrency_exhaustion_adds_cooldown() {
        let transport = ScriptedTransport::sequence(vec![
            Ok(ScriptedResponse::status(409)
                .header("X-ConcurrencyLimit-Limit", 2)
                .header("X-ConcurrencyLimit-Running", 2)),
            Ok(ScriptedResponse::ok("")),
        ]);
        let sleeper = TrackingSleeper::new();
        let executor = RequestExecutor::new(Arc::new(transport), RateLimitConfig::default())
            .with_sleeper(Arc::new(sleeper.clone()));

        executor.execute(request()).await.unwrap();

        assert_eq!(sleeper.calls(), vec![Duration::from_secs(5)]);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let transport = ScriptedTransport::always(ScriptedResponse::status(409));
        let config = RateLimitConfig { max_attempts: 3, ..Default::default() };
        let executor = RequestExecutor::new(Arc::new(transport.clone()), config)
            .with_sleeper(Arc::new(TrackingSleeper::new()));

        let err = executor.execute(request()).await.unwrap_err();

        assert_eq!(transport.request_count(), 3);
        assert!(matches!(err, ClientError::RateLimitExhausted { attempts: 3, status: 409, .. }));
        assert!(err.to_string().contains("3 attempts"));
    }

    #[tokio::test]
    async fn reserve_limit_triggers_cooldown_before_sending() {
        let transport = ScriptedTransport::always(ScriptedResponse::ok(""));
        let sleeper = TrackingSleeper::new();
        let executor = RequestExecutor::new(Arc::new(transport), RateLimitConfig::default())
            .with_sleeper(Arc::new(sleeper.clone()));
        let state = executor.state().get();
        executor.state().set(crate::rate_limit::RateLimitState { limit_remaining: 3, ..state });

        executor.execute(request()).await.unwrap();

        assert_eq!(sleeper.calls(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn error_statuses_carry_body_excerpt() {
        let body = "x".repeat(BODY_EXCERPT_LIMIT + 100);
        let transport = ScriptedTransport::always(ScriptedResponse::status(500).body(body));
        let executor = RequestExecutor::new(Arc::new(transport), RateLimitConfig::default());

        match executor.execute(request()).await.unwrap_err() {
            ClientError::Api { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), BODY_EXCERPT_LIMIT);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_is_an_authentication_error() {
        let transport = ScriptedTransport::always(ScriptedResponse::status(401));
        let executor = RequestExecutor::new(Arc::new(transport), RateLimitConfig::default());
        assert!(executor.execute(request()).await.unwrap_err().is_authentication());
    }
}
