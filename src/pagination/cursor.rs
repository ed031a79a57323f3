use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tracing::{debug, warn};

use super::{PageFetcher, PageMeta, Paginator, ServicePage};
use crate::error::ClientError;
use crate::transport::ApiRequest;
use crate::wire::service::decode_page;

/// How the page size reacts to timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizing {
    pub limit: u32,
    /// Subtracted from the limit after each timed-out page.
    pub decrement: u32,
    pub min_limit: u32,
}

impl PageSizing {
    /// Smaller limit to retry with, if there is one.
    fn shrink(&self) -> Option<u32> {
        let next = self.limit.saturating_sub(self.decrement).max(self.min_limit);
        (next < self.limit).then_some(next)
    }
}

/// `lastId` cursor pagination over a `ServiceResponse` search.
///
/// `build(start_from_id, limit, previous)` produces each page's request; `start_from_id` is
/// `None` for the first page. A page that times out is requested again with a smaller limit,
/// down to `min_limit`, and the smaller limit sticks for the rest of the sequence. Cursors must
/// strictly increase; a repeated or decreasing `lastId` fails with
/// [`ClientError::NonIncreasingCursor`] instead of looping forever.
pub struct CursorPaginator<'a, T, B> {
    fetcher: &'a dyn PageFetcher,
    build: B,
    sizing: PageSizing,
    start_from_id: Option<u64>,
    highest_seen: Option<u64>,
    previous: Option<PageMeta>,
    done: bool,
    _records: PhantomData<fn() -> T>,
}

impl<'a, T, B> CursorPaginator<'a, T, B>
where
    B: Fn(Option<u64>, u32, Option<&PageMeta>) -> ApiRequest + Send + Sync,
{
    pub fn new(fetcher: &'a dyn PageFetcher, sizing: PageSizing, build: B) -> Self {
        Self {
            fetcher,
            build,
            sizing,
            start_from_id: None,
            highest_seen: None,
            previous: None,
            done: false,
            _records: PhantomData,
        }
    }

    /// Current page size.
    pub fn limit(&self) -> u32 {
        self.sizing.limit
    }

    fn request(&self) -> ApiRequest {
        (self.build)(self.start_from_id, self.sizing.limit, self.previous.as_ref())
    }

    fn advance(&mut self, meta: &PageMeta, url: &str) -> Result<(), ClientError> {
        if let Some(last_id) = meta.last_id {
            if let Some(previous) = self.highest_seen.filter(|seen| last_id <= *seen) {
                self.done = true;
                return Err(ClientError::NonIncreasingCursor {
                    url: url.to_string(),
                    cursor: last_id,
                    previous,
                });
            }
            self.highest_seen = Some(last_id);
        }

        match (meta.has_more_records, meta.last_id) {
            (true, Some(last_id)) => self.start_from_id = Some(last_id.saturating_add(1)),
            (true, None) => {
                warn!(url, "page reports more records but no lastId; stopping");
                self.done = true;
            }
            (false, _) => self.done = true,
        }
        Ok(())
    }
}

#[async_trait]
impl<'a, T, B> Paginator for CursorPaginator<'a, T, B>
where
    T: DeserializeOwned + Send,
    B: Fn(Option<u64>, u32, Option<&PageMeta>) -> ApiRequest + Send + Sync,
{
    type Page = ServicePage<T>;

    fn has_next_page(&self) -> bool {
        !self.done
    }

    fn peek_next_request(&self) -> Option<ApiRequest> {
        (!self.done).then(|| self.request())
    }

    async fn next_page(&mut self) -> Result<Option<ServicePage<T>>, ClientError> {
        if self.done {
            return Ok(None);
        }
        loop {
            let request = self.request();
            let url = request.url.to_string();
            let text = match self.fetcher.fetch_text(request).await {
                Ok(text) => text,
                Err(e) if e.is_timeout() => match self.sizing.shrink() {
                    Some(smaller) => {
                        warn!(
                            url = %url,
                            limit = self.sizing.limit,
                            next_limit = smaller,
                            "page timed out; retrying with a smaller page"
                        );
                        self.sizing.limit = smaller;
                        continue;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            };

            let page: ServicePage<T> = decode_page(&text)?;
            debug!(
                start_from_id = ?self.start_from_id,
                limit = self.sizing.limit,
                count = page.meta.count,
                last_id = ?page.meta.last_id,
                "cursor page"
            );
            self.advance(&page.meta, &url)?;
            self.previous = Some(page.meta.clone());
            return Ok(Some(page));
        }
    }
}
