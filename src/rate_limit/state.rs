use serde::Serialize;

use super::RateLimitHeaders;

/// Last capacity snapshot reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitState {
    /// Requests allowed per window.
    pub limit: u32,
    /// Requests left in the current window.
    pub limit_remaining: u32,
    pub limit_window_seconds: u32,
    /// Seconds the server asked us to wait before the next request.
    pub to_wait_seconds: u32,
    /// Concurrent requests allowed for the account.
    pub concurrency: u32,
    /// Requests the server sees running for the account, ours included.
    pub concurrency_running: u32,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self {
            limit: 300,
            limit_remaining: 300,
            limit_window_seconds: 3600,
            to_wait_seconds: 0,
            concurrency: 2,
            concurrency_running: 0,
        }
    }
}

impl RateLimitState {
    /// Derive the state that follows a response carrying `headers`.
    ///
    /// Present headers replace the matching field, absent ones keep the previous value. The wait
    /// instruction only applies to the response that sent it, so a missing wait header resets
    /// it to zero.
    pub fn apply(&self, headers: &RateLimitHeaders) -> Self {
        Self {
            limit: headers.limit.unwrap_or(self.limit),
            limit_remaining: headers.limit_remaining.unwrap_or(self.limit_remaining),
            limit_window_seconds: headers.limit_window_seconds.unwrap_or(self.limit_window_seconds),
            to_wait_seconds: headers.to_wait_seconds.unwrap_or(0),
            concurrency: headers.concurrency.unwrap_or(self.concurrency),
            concurrency_running: headers.concurrency_running.unwrap_or(self.concurrency_running),
        }
    }
}
