use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::CONTENT_TYPE;
use std::io::ErrorKind;
use std::time::Duration;

use super::{ApiRequest, ApiResponse, RequestBody, Transport};
use crate::config::{ClientConfig, Credentials};
use crate::error::{ClientError, TransportError};

/// The legacy endpoints reject requests without this header.
const REQUESTED_WITH: &str = "qualys-client";

/// `reqwest`-backed transport authenticating every request with HTTP basic auth.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    credentials: Credentials,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, credentials: config.credentials.clone(), timeout: config.request_timeout })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = request.url.to_string();
        let timeout = request.timeout.unwrap_or(self.timeout);

        let builder = self
            .client
            .request(request.method, request.url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header("X-Requested-With", REQUESTED_WITH)
            .timeout(timeout);
        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Xml(xml) => builder.header(CONTENT_TYPE, "text/xml").body(xml),
            RequestBody::Form(params) => builder.form(&params),
        };

        let response = builder.send().await.map_err(|source| {
            if source.is_timeout() {
                TransportError::Timeout { url: url.clone(), timeout }
            } else {
                TransportError::Network { url: url.clone(), source }
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map_err(body_error);
        Ok(ApiResponse::new(url, status, headers, Box::pin(body)))
    }
}

/// The request timeout also bounds the body; a stalled body keeps its timeout kind.
fn body_error(source: reqwest::Error) -> std::io::Error {
    let kind = if source.is_timeout() { ErrorKind::TimedOut } else { ErrorKind::Other };
    std::io::Error::new(kind, source)
}
