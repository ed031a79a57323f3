#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # qualys-client
//!
//! A resilient client for the Qualys vulnerability management and web application scanning
//! APIs.
//!
//! The API enforces a request-rate window and an account-wide ceiling on concurrently running
//! requests, reports both on every response, and returns large result sets in three pagination
//! styles. This crate turns those signals into local throttling:
//!
//! - **Rate-limit tracking**: capacity headers feed a shared [`RateLimitState`] that decides
//!   how long to wait before the next request.
//! - **Request execution** with separate budgets for capacity rejections (409) and unexpected
//!   failures (transport errors, 5xx).
//! - **Adaptive concurrency** for batch endpoints, sized from the server's concurrency headers.
//! - **Pagination** by offset, by `lastId` cursor with page shrinking on timeouts, and by id
//!   batch.
//! - **Streaming detections**: host detection listings are parsed incrementally and each host
//!   is dispatched to the consumer with bounded concurrency and an error budget.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use qualys_client::{Client, ClientConfig, Credentials, IterateOptions};
//! use qualys_client::error::BoxError;
//! use qualys_client::stream::DetectionHost;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), qualys_client::ClientError> {
//!     let config = ClientConfig::new(
//!         "https://qualysapi.qualys.com".parse().unwrap(),
//!         Credentials::new("user", "secret"),
//!     );
//!     let client = Client::new(config)?;
//!
//!     let ids = client.fetch_host_ids(&[]).await?;
//!     client
//!         .iterate_host_detections(&ids, |host: DetectionHost| async move {
//!             println!("{} has {} detections", host.id, host.detections.len());
//!             Ok::<(), BoxError>(())
//!         }, IterateOptions::new())
//!         .await
//! }
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod iterate;
pub mod model;
pub mod pagination;
pub mod prelude;
pub mod rate_limit;
pub mod retry;
pub mod sleeper;
pub mod stream;
pub mod telemetry;
pub mod throttle;
pub mod transport;
pub mod wire;

// Re-exports
pub use backoff::Backoff;
pub use client::{Client, ClientBuilder, Criteria};
pub use config::{ClientConfig, Credentials, PaginationConfig};
pub use error::{BoxError, ClientError, TransportError};
pub use executor::RequestExecutor;
pub use iterate::{FailedRequest, IterateOptions, Iteratee};
pub use rate_limit::{RateLimitConfig, RateLimitState, SharedRateLimitState};
pub use retry::{RetryConfig, RetryPolicy, RetryPolicyBuilder};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use stream::{parse_host_detections, StreamOptions, StreamSummary};
pub use throttle::{calculate_concurrency, ConcurrencyThrottler};
