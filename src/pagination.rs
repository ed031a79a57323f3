//! One iteration contract over the API's three pagination schemes.
//!
//! - [`OffsetPaginator`]: `startFromOffset` advanced by the page size while `hasMoreRecords`.
//! - [`CursorPaginator`]: `startFromId = lastId + 1`, shrinking the page size after timeouts.
//! - [`IdBatchPaginator`]: a known id list cut into fixed batches, one request each.
//!
//! A paginator only builds requests and interprets responses; sending goes through a
//! [`PageFetcher`], in production the client with its retry and rate-limit handling. The next
//! request is always derived from the previous page's [`PageMeta`], so pages are strictly
//! sequential except for id batches, which are independent and can be handed to the
//! [`ConcurrencyThrottler`](crate::throttle::ConcurrencyThrottler) via
//! [`IdBatchPaginator::into_batches`].

pub mod cursor;
pub mod id_batch;
pub mod offset;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::transport::{ApiRequest, ApiResponse};

pub use crate::wire::{PageMeta, ServicePage};
pub use cursor::{CursorPaginator, PageSizing};
pub use id_batch::{BatchPage, IdBatch, IdBatchPaginator};
pub use offset::OffsetPaginator;

/// Sends page requests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: ApiRequest) -> Result<ApiResponse, ClientError>;

    /// Fetch and read the whole body. Implementations with retries should cover the body read
    /// too, since a body can stall after the status line arrived.
    async fn fetch_text(&self, request: ApiRequest) -> Result<String, ClientError> {
        self.fetch(request).await?.text().await
    }
}

/// A sequence of pages.
#[async_trait]
pub trait Paginator: Send {
    type Page: Send;

    /// Whether [`Paginator::next_page`] would issue another request.
    fn has_next_page(&self) -> bool;

    /// The request the next call to [`Paginator::next_page`] starts with.
    fn peek_next_request(&self) -> Option<ApiRequest>;

    /// Fetch the next page; `Ok(None)` once the sequence is exhausted.
    async fn next_page(&mut self) -> Result<Option<Self::Page>, ClientError>;
}
