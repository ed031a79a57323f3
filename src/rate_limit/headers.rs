//! Parse the capacity headers attached to every API response.

use reqwest::header::HeaderMap;
use serde::Serialize;

const LIMIT: &[&str] = &["x-ratelimit-limit"];
const REMAINING: &[&str] = &["x-ratelimit-remaining"];
const WINDOW_SECONDS: &[&str] = &["x-ratelimit-window-sec"];
const TO_WAIT_SECONDS: &[&str] = &["x-ratelimit-towait-sec"];
// The service is not consistent about the hyphen between "Concurrency" and "Limit".
const CONCURRENCY_LIMIT: &[&str] = &["x-concurrency-limit-limit", "x-concurrencylimit-limit"];
const CONCURRENCY_RUNNING: &[&str] =
    &["x-concurrency-limit-running", "x-concurrencylimit-running"];

/// Capacity values carried by a single response.
///
/// `None` means the header was not sent, which is different from the server reporting zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub limit_remaining: Option<u32>,
    pub limit_window_seconds: Option<u32>,
    pub to_wait_seconds: Option<u32>,
    pub concurrency: Option<u32>,
    pub concurrency_running: Option<u32>,
}

/// Which capacity a rate-limited response reported as exhausted.
///
/// The service uses the same status code for both, so the only signal is which header pair
/// came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CapacityExhaustion {
    /// The request-rate window ran out; the wait header tells us how long to back off.
    RateWindow,
    /// Too many requests were running at once.
    Concurrency,
    /// Neither header pair was present.
    Unspecified,
}

impl RateLimitHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            limit: parse_header_value(headers, LIMIT),
            limit_remaining: parse_header_value(headers, REMAINING),
            limit_window_seconds: parse_header_value(headers, WINDOW_SECONDS),
            to_wait_seconds: parse_header_value(headers, TO_WAIT_SECONDS),
            concurrency: parse_header_value(headers, CONCURRENCY_LIMIT),
            concurrency_running: parse_header_value(headers, CONCURRENCY_RUNNING),
        }
    }

    /// Whether any rate-window header was present.
    pub fn has_rate_window(&self) -> bool {
        self.limit.is_some() || self.limit_remaining.is_some() || self.to_wait_seconds.is_some()
    }

    /// Whether any concurrency header was present.
    pub fn has_concurrency(&self) -> bool {
        self.concurrency.is_some() || self.concurrency_running.is_some()
    }

    /// Classify a rate-limited response by the headers it carried.
    pub fn exhaustion(&self) -> CapacityExhaustion {
        if self.has_rate_window() {
            CapacityExhaustion::RateWindow
        } else if self.has_concurrency() {
            CapacityExhaustion::Concurrency
        } else {
            CapacityExhaustion::Unspecified
        }
    }
}

/// First header in `names` holding a valid non-negative integer.
fn parse_header_value(headers: &HeaderMap, names: &[&str]) -> Option<u32> {
    names.iter().find_map(|name| {
        headers.get(*name).and_then(|value| value.to_str().ok()).and_then(|s| s.trim().parse().ok())
    })
}
