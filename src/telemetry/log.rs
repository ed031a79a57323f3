use tracing::{debug, warn};

use super::{ClientEvent, EventListener};

/// Renders client events as `tracing` records.
///
/// Capacity waits and rejections are logged at `warn`, everything else at `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl EventListener for LogListener {
    fn on_event(&self, event: &ClientEvent) {
        match event {
            ClientEvent::Request(e) => {
                debug!(method = %e.method, url = %e.url, attempt = e.attempt, "sending request");
            }
            ClientEvent::DelayedRequest(e) => {
                warn!(
                    method = %e.method,
                    url = %e.url,
                    attempt = e.attempt,
                    delay_ms = e.delay.as_millis() as u64,
                    limit_remaining = e.rate_limit_state.limit_remaining,
                    "delaying request to respect rate limit"
                );
            }
            ClientEvent::Response(e) if e.exhaustion.is_some() => {
                warn!(
                    url = %e.url,
                    status = e.status,
                    attempt = e.attempt,
                    exhaustion = ?e.exhaustion,
                    to_wait_seconds = e.next_rate_limit_state.to_wait_seconds,
                    concurrency_running = e.next_rate_limit_state.concurrency_running,
                    "capacity exhausted"
                );
            }
            ClientEvent::Response(e) => {
                debug!(
                    url = %e.url,
                    status = e.status,
                    attempt = e.attempt,
                    duration_ms = e.duration.as_millis() as u64,
                    limit_remaining = e.next_rate_limit_state.limit_remaining,
                    concurrency_running = e.next_rate_limit_state.concurrency_running,
                    "received response"
                );
            }
            ClientEvent::Retry(e) => {
                warn!(
                    attempt = e.attempt,
                    max_attempts = e.max_attempts,
                    delay_ms = e.delay.as_millis() as u64,
                    error = %e.error,
                    "retrying request"
                );
            }
        }
    }
}
