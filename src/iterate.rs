//! Consumer callbacks and per-iteration options.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::{BoxError, ClientError};
use crate::transport::ApiRequest;

/// Receives records one at a time.
///
/// Implemented for any `Fn(T) -> impl Future<Output = Result<(), BoxError>>`.
#[async_trait]
pub trait Iteratee<T>: Send + Sync {
    async fn call(&self, record: T) -> Result<(), BoxError>;
}

#[async_trait]
impl<T, F, Fut> Iteratee<T> for F
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    async fn call(&self, record: T) -> Result<(), BoxError> {
        self(record).await
    }
}

/// Request that failed during an iteration, as reported to
/// [`IterateOptions::on_request_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRequest {
    pub request: ApiRequest,
    /// Ids of the failed batch; empty for paged searches.
    pub ids: Vec<u64>,
}

pub type RequestErrorHook = Arc<dyn Fn(&ClientError, &FailedRequest) + Send + Sync>;
pub type IterateeErrorHook<T> = Arc<dyn Fn(&BoxError, &T) + Send + Sync>;

/// Error handling for one `iterate_*` call.
///
/// Without `on_request_error` the first failed request aborts the iteration: batches that have
/// not started are skipped and the error is returned once started ones finish. With it, the
/// failure is reported and the iteration moves on.
///
/// Without `on_iteratee_error` a failing iteratee aborts a paged iteration with
/// [`ClientError::Iteratee`]. Streamed detections always continue within their error budget and
/// report each failure to the hook when one is set.
pub struct IterateOptions<T> {
    pub on_request_error: Option<RequestErrorHook>,
    pub on_iteratee_error: Option<IterateeErrorHook<T>>,
}

impl<T> Default for IterateOptions<T> {
    fn default() -> Self {
        Self { on_request_error: None, on_iteratee_error: None }
    }
}

impl<T> Clone for IterateOptions<T> {
    fn clone(&self) -> Self {
        Self {
            on_request_error: self.on_request_error.clone(),
            on_iteratee_error: self.on_iteratee_error.clone(),
        }
    }
}

impl<T> fmt::Debug for IterateOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterateOptions")
            .field("on_request_error", &self.on_request_error.is_some())
            .field("on_iteratee_error", &self.on_iteratee_error.is_some())
            .finish()
    }
}

impl<T> IterateOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_request_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ClientError, &FailedRequest) + Send + Sync + 'static,
    {
        self.on_request_error = Some(Arc::new(hook));
        self
    }

    pub fn on_iteratee_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&BoxError, &T) + Send + Sync + 'static,
    {
        self.on_iteratee_error = Some(Arc::new(hook));
        self
    }

    /// Report a failed request, or hand the error back when there is nobody to report it to.
    pub(crate) fn report_request_error(
        &self,
        error: ClientError,
        failed: &FailedRequest,
    ) -> Result<(), ClientError> {
        match &self.on_request_error {
            Some(hook) => {
                hook(&error, failed);
                Ok(())
            }
            None => Err(error),
        }
    }

    /// Report a failed iteratee call, or convert the failure into an abort.
    pub(crate) fn report_iteratee_error(&self, error: BoxError, record: &T) -> Result<(), ClientError> {
        match &self.on_iteratee_error {
            Some(hook) => {
                hook(&error, record);
                Ok(())
            }
            None => Err(ClientError::Iteratee(error)),
        }
    }
}
