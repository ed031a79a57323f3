use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tracing::debug;

use super::{PageFetcher, PageMeta, Paginator, ServicePage};
use crate::error::ClientError;
use crate::transport::ApiRequest;
use crate::wire::service::decode_page;

/// Offsets are 1-based.
pub const FIRST_OFFSET: u64 = 1;

/// `startFromOffset` pagination over a `ServiceResponse` search.
///
/// `build(offset, limit, previous)` produces each page's request.
pub struct OffsetPaginator<'a, T, B> {
    fetcher: &'a dyn PageFetcher,
    build: B,
    limit: u32,
    offset: u64,
    previous: Option<PageMeta>,
    done: bool,
    _records: PhantomData<fn() -> T>,
}

impl<'a, T, B> OffsetPaginator<'a, T, B>
where
    B: Fn(u64, u32, Option<&PageMeta>) -> ApiRequest + Send + Sync,
{
    pub fn new(fetcher: &'a dyn PageFetcher, limit: u32, build: B) -> Self {
        Self {
            fetcher,
            build,
            limit,
            offset: FIRST_OFFSET,
            previous: None,
            done: false,
            _records: PhantomData,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

#[async_trait]
impl<'a, T, B> Paginator for OffsetPaginator<'a, T, B>
where
    T: DeserializeOwned + Send,
    B: Fn(u64, u32, Option<&PageMeta>) -> ApiRequest + Send + Sync,
{
    type Page = ServicePage<T>;

    fn has_next_page(&self) -> bool {
        !self.done
    }

    fn peek_next_request(&self) -> Option<ApiRequest> {
        (!self.done).then(|| (self.build)(self.offset, self.limit, self.previous.as_ref()))
    }

    async fn next_page(&mut self) -> Result<Option<ServicePage<T>>, ClientError> {
        let Some(request) = self.peek_next_request() else {
            return Ok(None);
        };
        let text = self.fetcher.fetch_text(request).await?;
        let page: ServicePage<T> = decode_page(&text)?;

        debug!(offset = self.offset, count = page.meta.count, more = page.meta.has_more_records, "offset page");
        if page.meta.has_more_records {
            self.offset += u64::from(self.limit);
        } else {
            self.done = true;
        }
        self.previous = Some(page.meta.clone());
        Ok(Some(page))
    }
}
