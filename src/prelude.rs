//! Convenient re-exports for common client types.
pub use crate::{
    client::{Client, ClientBuilder, Criteria},
    config::{ClientConfig, Credentials, PaginationConfig},
    error::{BoxError, ClientError},
    iterate::{FailedRequest, IterateOptions, Iteratee},
    model::{Finding, HostAsset, Vulnerability, WebApp},
    pagination::{PageFetcher, Paginator},
    stream::{Detection, DetectionHost, StreamSummary},
    telemetry::{ClientEvent, EventBus, EventListener},
};
