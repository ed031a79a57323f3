use async_trait::async_trait;
use std::collections::VecDeque;

use super::{PageFetcher, Paginator};
use crate::error::ClientError;
use crate::transport::{ApiRequest, ApiResponse};

/// One batch of ids and the request that fetches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdBatch {
    pub ids: Vec<u64>,
    pub request: ApiRequest,
}

/// Response for one batch, body not yet read.
#[derive(Debug)]
pub struct BatchPage {
    pub ids: Vec<u64>,
    pub response: ApiResponse,
}

/// Fetches a known id list in fixed-size batches.
///
/// Batches are cut up front, so they do not depend on each other and may run concurrently
/// through [`IdBatchPaginator::into_batches`].
pub struct IdBatchPaginator<'a> {
    fetcher: &'a dyn PageFetcher,
    batches: VecDeque<IdBatch>,
}

impl<'a> IdBatchPaginator<'a> {
    /// `build` receives each batch's ids. A `batch_size` of zero is treated as one.
    pub fn new<B>(fetcher: &'a dyn PageFetcher, ids: &[u64], batch_size: usize, build: B) -> Self
    where
        B: Fn(&[u64]) -> ApiRequest,
    {
        let batches = ids
            .chunks(batch_size.max(1))
            .map(|chunk| IdBatch { ids: chunk.to_vec(), request: build(chunk) })
            .collect();
        Self { fetcher, batches }
    }

    pub fn remaining(&self) -> usize {
        self.batches.len()
    }

    /// Hand the unfetched batches over for concurrent execution.
    pub fn into_batches(self) -> Vec<IdBatch> {
        self.batches.into()
    }
}

#[async_trait]
impl Paginator for IdBatchPaginator<'_> {
    type Page = BatchPage;

    fn has_next_page(&self) -> bool {
        !self.batches.is_empty()
    }

    fn peek_next_request(&self) -> Option<ApiRequest> {
        self.batches.front().map(|batch| batch.request.clone())
    }

    async fn next_page(&mut self) -> Result<Option<BatchPage>, ClientError> {
        let Some(batch) = self.batches.pop_front() else {
            return Ok(None);
        };
        let response = self.fetcher.fetch(batch.request).await?;
        Ok(Some(BatchPage { ids: batch.ids, response }))
    }
}
