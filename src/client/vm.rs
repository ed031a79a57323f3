//! Vulnerability management: host ids, host details, detections and the knowledge base.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::service_request::{render, Criteria, Start};
use super::{deliver, Client};
use crate::error::ClientError;
use crate::iterate::{IterateOptions, Iteratee};
use crate::model::{HostAsset, Vulnerability};
use crate::pagination::IdBatchPaginator;
use crate::stream::{parse_host_detections, DetectionHost, StreamOptions};
use crate::transport::ApiRequest;
use crate::wire::legacy::{decode_host_ids, decode_vulnerabilities};
use crate::wire::service::decode_page;

const HOST_LIST: &str = "/api/2.0/fo/asset/host/?action=list";
const HOST_ASSET_SEARCH: &str = "/qps/rest/2.0/search/am/hostasset";
const HOST_DETECTION_LIST: &str = "/api/2.0/fo/asset/host/vm/detection/?action=list";
const KNOWLEDGE_BASE_LIST: &str = "/api/2.0/fo/knowledge_base/vuln/?action=list";

/// Continuation links carry the next page's lower id bound in this parameter.
const ID_MIN: &str = "id_min";

fn joined(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",")
}

fn id_min(url: &Url) -> Option<u64> {
    url.query_pairs().find(|(k, _)| k == ID_MIN).and_then(|(_, v)| v.parse().ok())
}

impl Client {
    /// Ids of every host matching the legacy list `filters`, following truncation links.
    pub async fn fetch_host_ids(&self, filters: &[(String, String)]) -> Result<Vec<u64>, ClientError> {
        let mut params = BTreeMap::from([
            ("details".to_string(), "None".to_string()),
            ("truncation_limit".to_string(), self.config.pagination.host_id_page_size.to_string()),
        ]);
        params.extend(filters.iter().cloned());
        let mut request = ApiRequest::post_form(self.endpoint(HOST_LIST)?, params);

        let mut ids = Vec::new();
        let mut previous_min: Option<u64> = None;
        loop {
            let url = request.url.to_string();
            let text = self.request_text(request).await?;
            let page = decode_host_ids(&text)?;
            debug!(count = page.ids.len(), truncated = page.next_url.is_some(), "host id page");
            ids.extend(page.ids);

            let Some(next) = page.next_url else {
                return Ok(ids);
            };
            let next = Url::parse(&next)
                .map_err(|e| ClientError::Config(format!("invalid continuation link {next}: {e}")))?;
            let Some(min) = id_min(&next) else {
                warn!(url = %next, "continuation link without {ID_MIN}; stopping");
                return Ok(ids);
            };
            if let Some(previous) = previous_min.filter(|previous| min <= *previous) {
                return Err(ClientError::NonIncreasingCursor { url, cursor: min, previous });
            }
            previous_min = Some(min);
            request = ApiRequest::get(next);
        }
    }

    /// Asset details for `ids` (legacy host ids), fetched in concurrent batches.
    pub async fn iterate_host_details<I>(
        &self,
        ids: &[u64],
        iteratee: I,
        options: IterateOptions<HostAsset>,
    ) -> Result<(), ClientError>
    where
        I: Iteratee<HostAsset>,
    {
        let url = self.endpoint(HOST_ASSET_SEARCH)?;
        let size = self.config.pagination.host_detail_batch_size;
        let batches = IdBatchPaginator::new(self, ids, size, |chunk| {
            let criteria = [Criteria::one_of("qwebHostId", chunk)];
            let limit = u32::try_from(chunk.len()).unwrap_or(u32::MAX);
            ApiRequest::post_xml(url.clone(), render(&criteria, limit, Start::First))
        })
        .into_batches();

        let (iteratee, options_ref) = (&iteratee, &options);
        self.run_batches(batches, &options, move |batch| async move {
            let text = self.request_text(batch.request).await?;
            let page = decode_page::<HostAsset>(&text)?;
            deliver(page.records, iteratee, options_ref).await
        })
        .await
    }

    /// Detections for `ids`, streamed batch by batch into `iteratee`.
    ///
    /// Each batch body is parsed incrementally with the configured dispatch concurrency and
    /// error budget; an exhausted budget fails that batch with
    /// [`ClientError::IterateeErrorLimit`].
    pub async fn iterate_host_detections<I>(
        &self,
        ids: &[u64],
        iteratee: I,
        options: IterateOptions<DetectionHost>,
    ) -> Result<(), ClientError>
    where
        I: Iteratee<DetectionHost> + 'static,
    {
        let url = self.endpoint(HOST_DETECTION_LIST)?;
        let p = &self.config.pagination;
        let batches = IdBatchPaginator::new(self, ids, p.detection_batch_size, |chunk| {
            ApiRequest::post_form(
                url.clone(),
                [
                    ("ids", joined(chunk)),
                    ("output_format", "XML".to_string()),
                    ("show_results", "1".to_string()),
                    ("truncation_limit", "0".to_string()),
                ],
            )
        })
        .into_batches();

        let iteratee: Arc<dyn Iteratee<DetectionHost>> = Arc::new(iteratee);
        let stream_options = StreamOptions {
            concurrency: p.detection_concurrency,
            iteratee_error_limit: p.iteratee_error_limit,
            on_iteratee_error: options.on_iteratee_error.clone(),
        };
        let (iteratee, stream_options) = (&iteratee, &stream_options);
        self.run_batches(batches, &options, move |batch| async move {
            let response = self.request(batch.request).await?;
            let summary =
                parse_host_detections(response.into_reader(), iteratee.clone(), stream_options.clone())
                    .await?;
            debug!(hosts = summary.hosts, failures = summary.failures, "detection batch complete");
            Ok(())
        })
        .await
    }

    /// Knowledge base entries for `qids`.
    pub async fn iterate_vulnerabilities<I>(
        &self,
        qids: &[u64],
        iteratee: I,
        options: IterateOptions<Vulnerability>,
    ) -> Result<(), ClientError>
    where
        I: Iteratee<Vulnerability>,
    {
        let url = self.endpoint(KNOWLEDGE_BASE_LIST)?;
        let size = self.config.pagination.vulnerability_batch_size;
        let batches = IdBatchPaginator::new(self, qids, size, |chunk| {
            ApiRequest::post_form(url.clone(), [("ids", joined(chunk)), ("details", "All".to_string())])
        })
        .into_batches();

        let (iteratee, options_ref) = (&iteratee, &options);
        self.run_batches(batches, &options, move |batch| async move {
            let text = self.request_text(batch.request).await?;
            deliver(decode_vulnerabilities(&text)?, iteratee, options_ref).await
        })
        .await
    }
}
