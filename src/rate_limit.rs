//! Server-reported capacity tracking.
//!
//! The API enforces two independent limits and reports both on every response:
//! - a request-rate window (`X-RateLimit-*`), and
//! - a ceiling on concurrently running requests (`X-Concurrency-Limit-*`).
//!
//! This module turns those headers into a [`RateLimitState`] snapshot and holds the static
//! [`RateLimitConfig`] that decides how the client reacts to them:
//! - [`headers`]: parsing, tolerant of both concurrency header spellings.
//! - [`state`]: the snapshot and its update-if-present rule.
//! - [`shared`]: the per-client cell the snapshot is published through.

pub mod config;
pub mod headers;
pub mod shared;
pub mod state;

pub use config::RateLimitConfig;
pub use headers::{CapacityExhaustion, RateLimitHeaders};
pub use shared::SharedRateLimitState;
pub use state::RateLimitState;
