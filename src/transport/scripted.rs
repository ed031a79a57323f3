//! In-memory transport answering from a script, for tests and offline replays.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{ApiRequest, ApiResponse, Transport};
use crate::error::TransportError;

/// Canned response produced by a [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ScriptedResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::status(200).body(body)
    }

    pub fn status(status: u16) -> Self {
        Self { status, headers: Vec::new(), body: String::new() }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.headers.push((name.into(), value.to_string()));
        self
    }

    fn into_response(self, url: &str) -> Result<ApiResponse, TransportError> {
        let status = StatusCode::from_u16(self.status).map_err(|e| TransportError::Connection {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let mut headers = HeaderMap::new();
        for (name, value) in self.headers {
            let invalid = |message: String| TransportError::Connection { url: url.to_string(), message };
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let value = HeaderValue::from_str(&value).map_err(|e| invalid(e.to_string()))?;
            headers.append(name, value);
        }
        Ok(ApiResponse::from_bytes(url, status, headers, self.body))
    }
}

type Responder =
    dyn Fn(&ApiRequest, usize) -> Result<ScriptedResponse, TransportError> + Send + Sync;

/// Transport that answers every request by calling a responder with the request and its
/// zero-based sequence number, and records what was sent.
#[derive(Clone)]
pub struct ScriptedTransport {
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
    latency: Duration,
}

impl fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("requests", &self.request_count())
            .field("latency", &self.latency)
            .finish()
    }
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ApiRequest, usize) -> Result<ScriptedResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            requests: Arc::new(Mutex::new(Vec::new())),
            latency: Duration::ZERO,
        }
    }

    /// Answer with `script` in order, repeating the last entry once it runs out.
    pub fn sequence(script: Vec<Result<ScriptedResponse, TransportError>>) -> Self {
        Self::new(move |request, n| {
            let Some(entry) = script.get(n).or_else(|| script.last()) else {
                return Err(TransportError::Connection {
                    url: request.url.to_string(),
                    message: "empty script".into(),
                });
            };
            match entry {
                Ok(response) => Ok(response.clone()),
                Err(e) => Err(clone_error(e, request)),
            }
        })
    }

    /// Always answer with `response`.
    pub fn always(response: ScriptedResponse) -> Self {
        Self::new(move |_, _| Ok(response.clone()))
    }

    /// Hold every response for `latency` on the tokio timer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Requests sent so far, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ApiRequest>> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn clone_error(error: &TransportError, request: &ApiRequest) -> TransportError {
    match error {
        TransportError::Timeout { url, timeout } => {
            TransportError::Timeout { url: url.clone(), timeout: *timeout }
        }
        other => TransportError::Connection { url: request.url.to_string(), message: other.to_string() },
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let n = {
            let mut requests = self.lock();
            requests.push(request.clone());
            requests.len() - 1
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.responder)(&request, n)?.into_response(request.url.as_str())
    }
}
