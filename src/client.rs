//! The collaborator-facing client.
//!
//! Every operation funnels through [`Client::request`]: the retry policy wrapped around the
//! rate-limit-aware executor. Batch operations additionally run under the
//! [`ConcurrencyThrottler`], and host detections are parsed straight off the response body.
//!
//! ```rust,no_run
//! use qualys_client::{Client, ClientConfig, Credentials, IterateOptions};
//! use qualys_client::error::BoxError;
//! use qualys_client::model::WebApp;
//!
//! # async fn run() -> Result<(), qualys_client::ClientError> {
//! let config = ClientConfig::new(
//!     "https://qualysapi.qg3.apps.qualys.com".parse().unwrap(),
//!     Credentials::new("user", "secret"),
//! );
//! let client = Client::new(config)?;
//! client.verify_authentication().await?;
//! client
//!     .iterate_web_apps(&[], |app: WebApp| async move {
//!         println!("{}", app.id);
//!         Ok::<(), BoxError>(())
//!     }, IterateOptions::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod service_request;
mod vm;
mod was;

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::executor::RequestExecutor;
use crate::iterate::{FailedRequest, IterateOptions, Iteratee};
use crate::pagination::{IdBatch, PageFetcher};
use crate::rate_limit::{RateLimitState, SharedRateLimitState};
use crate::retry::RetryPolicy;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::telemetry::{EventBus, LogListener, Subscription};
use crate::throttle::ConcurrencyThrottler;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

pub use service_request::Criteria;

const ABOUT_PATH: &str = "/msp/about.php";

/// Vulnerability API client.
///
/// Cheap to clone; clones share the event bus, capacity state and transport.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    executor: RequestExecutor,
    retry: RetryPolicy,
    bus: EventBus,
    state: SharedRateLimitState,
    _log: Arc<Subscription>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("api_url", &self.config.api_url.as_str())
            .field("state", &self.state.get())
            .finish()
    }
}

/// Builder for [`Client`], mainly to inject a transport or sleeper.
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    sleeper: Arc<dyn Sleeper>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, transport: None, sleeper: Arc::new(TokioSleeper) }
    }

    /// Send requests through `transport` instead of HTTP.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Wait through `sleeper` for rate-limit delays and retry backoff.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn build(self) -> Result<Client, ClientError> {
        self.config.validate()?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config)?),
        };

        let bus = EventBus::new();
        let state = SharedRateLimitState::default();
        let log = bus.subscribe(LogListener);
        let executor = RequestExecutor::new(transport, self.config.rate_limit)
            .with_bus(bus.clone())
            .with_state(state.clone())
            .with_sleeper(self.sleeper.clone());
        let retry = RetryPolicy::from_config(&self.config.retry)
            .with_bus(bus.clone())
            .with_shared_sleeper(self.sleeper)
            .build()?;

        Ok(Client {
            config: Arc::new(self.config),
            executor,
            retry,
            bus,
            state,
            _log: Arc::new(log),
        })
    }
}

impl Client {
    /// Client talking HTTP with default policies.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        ClientBuilder::new(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The bus this client publishes its lifecycle events on.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Latest capacity snapshot reported by the server.
    pub fn rate_limit_state(&self) -> RateLimitState {
        self.state.get()
    }

    /// Perform one logical request with retries and rate-limit handling.
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.retry.execute(|| self.executor.execute(request.clone())).await
    }

    /// [`Client::request`] reading the whole body inside each attempt, so a body that breaks
    /// off is retried like a failed send.
    pub async fn request_text(&self, request: ApiRequest) -> Result<String, ClientError> {
        let request = &request;
        self.retry
            .execute(|| async move { self.executor.execute(request.clone()).await?.text().await })
            .await
    }

    /// Check that the configured credentials are accepted.
    pub async fn verify_authentication(&self) -> Result<(), ClientError> {
        let url = self.config.endpoint(ABOUT_PATH)?;
        self.request(ApiRequest::get(url)).await?;
        info!(api_url = %self.config.api_url, "credentials verified");
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.config.endpoint(path)
    }

    fn throttler(&self) -> ConcurrencyThrottler {
        ConcurrencyThrottler::new(self.bus.clone(), self.state.clone())
    }

    /// Run `work` for every batch under the throttler.
    ///
    /// Failures go to `on_request_error` when set; otherwise the first failure stops batches
    /// that have not started and is returned once running ones finish. Iteratee failures that
    /// escaped their own hook always abort.
    async fn run_batches<T, F, Fut>(
        &self,
        batches: Vec<IdBatch>,
        options: &IterateOptions<T>,
        work: F,
    ) -> Result<(), ClientError>
    where
        F: Fn(IdBatch) -> Fut,
        Fut: Future<Output = Result<(), ClientError>>,
    {
        let aborted = AtomicBool::new(false);
        let first_error: Mutex<Option<ClientError>> = Mutex::new(None);
        let (aborted, first_error, work) = (&aborted, &first_error, &work);

        let tasks = batches.into_iter().map(move |batch| async move {
            if aborted.load(Ordering::SeqCst) {
                return;
            }
            let failed = FailedRequest { request: batch.request.clone(), ids: batch.ids.clone() };
            let Err(error) = work(batch).await else {
                return;
            };
            let escalated = match error {
                e @ ClientError::Iteratee(_) => Err(e),
                e => options.report_request_error(e, &failed),
            };
            if let Err(error) = escalated {
                warn!(ids = failed.ids.len(), error = %error, "batch failed; aborting iteration");
                aborted.store(true, Ordering::SeqCst);
                first_error.lock().unwrap_or_else(|p| p.into_inner()).get_or_insert(error);
            }
        });
        self.throttler().run(tasks).await;

        let error = first_error.lock().unwrap_or_else(|p| p.into_inner()).take();
        error.map_or(Ok(()), Err)
    }
}

/// Deliver `records` in order, routing failures through `options`.
async fn deliver<T, I>(records: Vec<T>, iteratee: &I, options: &IterateOptions<T>) -> Result<(), ClientError>
where
    T: Clone + Send,
    I: Iteratee<T> + ?Sized,
{
    for record in records {
        let copy = options.on_iteratee_error.as_ref().map(|_| record.clone());
        if let Err(error) = iteratee.call(record).await {
            match copy {
                Some(record) => options.report_iteratee_error(error, &record)?,
                None => return Err(ClientError::Iteratee(error)),
            }
        }
    }
    Ok(())
}

#[async_trait]
impl PageFetcher for Client {
    async fn fetch(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.request(request).await
    }

    async fn fetch_text(&self, request: ApiRequest) -> Result<String, ClientError> {
        self.request_text(request).await
    }
}
