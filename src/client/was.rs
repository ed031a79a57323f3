//! Web application scanning searches.

use serde::de::DeserializeOwned;
use tracing::debug;

use super::service_request::{render, Criteria, Start};
use super::{deliver, Client};
use crate::error::ClientError;
use crate::iterate::{FailedRequest, IterateOptions, Iteratee};
use crate::model::{Finding, WebApp};
use crate::pagination::cursor::PageSizing;
use crate::pagination::{CursorPaginator, OffsetPaginator, Paginator, ServicePage};
use crate::transport::ApiRequest;

const WEB_APP_SEARCH: &str = "/qps/rest/3.0/search/was/webapp";
const FINDING_SEARCH: &str = "/qps/rest/3.0/search/was/finding";

impl Client {
    /// Every web application matching `filters`, paged by offset.
    pub async fn iterate_web_apps<I>(
        &self,
        filters: &[Criteria],
        iteratee: I,
        options: IterateOptions<WebApp>,
    ) -> Result<(), ClientError>
    where
        I: Iteratee<WebApp>,
    {
        let url = self.endpoint(WEB_APP_SEARCH)?;
        let limit = self.config.pagination.web_app_page_size;
        let paginator = OffsetPaginator::new(self, limit, |offset, limit, _| {
            ApiRequest::post_xml(url.clone(), render(filters, limit, Start::Offset(offset)))
        });
        drain_pages(paginator, &iteratee, &options).await
    }

    /// Every finding matching `filters`, paged by `lastId`.
    ///
    /// Finding pages are expensive to render server-side; a page that times out is requested
    /// again with fewer records.
    pub async fn iterate_findings<I>(
        &self,
        filters: &[Criteria],
        iteratee: I,
        options: IterateOptions<Finding>,
    ) -> Result<(), ClientError>
    where
        I: Iteratee<Finding>,
    {
        let url = self.endpoint(FINDING_SEARCH)?;
        let p = &self.config.pagination;
        let sizing = PageSizing {
            limit: p.finding_page_size,
            decrement: p.finding_page_decrement,
            min_limit: p.finding_min_page_size,
        };
        let paginator = CursorPaginator::new(self, sizing, |start_from_id, limit, _| {
            let start = start_from_id.map_or(Start::First, Start::Id);
            ApiRequest::post_xml(url.clone(), render(filters, limit, start))
        });
        drain_pages(paginator, &iteratee, &options).await
    }
}

/// Deliver every page of a sequential search.
///
/// A failed page cannot be skipped: the next request depends on its metadata. With a request
/// hook the failure is reported and the iteration ends quietly.
async fn drain_pages<T, P, I>(
    mut paginator: P,
    iteratee: &I,
    options: &IterateOptions<T>,
) -> Result<(), ClientError>
where
    T: DeserializeOwned + Clone + Send,
    P: Paginator<Page = ServicePage<T>>,
    I: Iteratee<T>,
{
    let mut pages = 0usize;
    while let Some(request) = paginator.peek_next_request() {
        let page = match paginator.next_page().await {
            Ok(Some(page)) => page,
            Ok(None) => break,
            Err(error) => {
                return options.report_request_error(error, &FailedRequest { request, ids: Vec::new() });
            }
        };
        pages += 1;
        deliver(page.records, iteratee, options).await?;
    }
    debug!(pages, "search complete");
    Ok(())
}
