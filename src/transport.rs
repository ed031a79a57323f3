//! Request and response types and the [`Transport`] seam.
//!
//! The executor never talks to `reqwest` directly. [`HttpTransport`] is the production
//! implementation; tests substitute scripted transports.

pub mod http;
pub mod scripted;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::fmt;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::io::StreamReader;
use url::Url;

use crate::error::{ClientError, TransportError};

pub use self::http::HttpTransport;
pub use self::scripted::{ScriptedResponse, ScriptedTransport};

/// Response body as a stream of chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Buffered reader over a response body, used by the streaming parser.
pub type BodyReader = StreamReader<ByteStream, Bytes>;

/// Sends one physical request.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    /// `text/xml` body, used by the REST search endpoints.
    Xml(String),
    /// Urlencoded parameters, used by the legacy endpoints.
    Form(Vec<(String, String)>),
}

/// Descriptor of one logical request. Cloned for every physical attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub body: RequestBody,
    /// Overrides the transport's default timeout.
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, body: RequestBody::Empty, timeout: None }
    }

    pub fn post_xml(url: Url, xml: impl Into<String>) -> Self {
        Self { method: Method::POST, url, body: RequestBody::Xml(xml.into()), timeout: None }
    }

    pub fn post_form<K, V>(url: Url, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let params = params.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { method: Method::POST, url, body: RequestBody::Form(params), timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Response whose body has not been read yet.
pub struct ApiResponse {
    url: String,
    status: StatusCode,
    headers: HeaderMap,
    body: ByteStream,
}

impl fmt::Debug for ApiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiResponse")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &"<stream>")
            .finish()
    }
}

impl ApiResponse {
    pub fn new(url: impl Into<String>, status: StatusCode, headers: HeaderMap, body: ByteStream) -> Self {
        Self { url: url.into(), status, headers, body }
    }

    /// Response with a fully materialized body.
    pub fn from_bytes(
        url: impl Into<String>,
        status: StatusCode,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Self {
        let body: Bytes = body.into();
        let stream = futures::stream::once(async move { Ok::<_, std::io::Error>(body) });
        Self::new(url, status, headers, Box::pin(stream))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Read the whole body. Only for bounded documents; detection listings go through
    /// [`ApiResponse::into_reader`].
    pub async fn text(self) -> Result<String, ClientError> {
        let mut body = self.body;
        let mut buf = Vec::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk.map_err(TransportError::Body)?);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Incremental reader over the body.
    pub fn into_reader(self) -> BodyReader {
        StreamReader::new(self.body)
    }
}
