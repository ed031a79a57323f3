//! Error types for the client.
//!
//! Classification matters more than formatting here: the retry policy, the cursor paginator and
//! the iteration hooks all branch on the variant. See [`ClientError::is_timeout`] and
//! [`ClientError::is_retryable`].
use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by consumer callbacks (iteratees).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures raised below HTTP semantics: the request never produced a status line.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request exceeded the client-side timeout.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    /// Connection, TLS or protocol failure reported by the HTTP stack.
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// Failure injected by a non-HTTP transport (mocks, recorded sessions).
    #[error("request to {url} failed: {message}")]
    Connection { url: String, message: String },
    /// The response body stream broke while it was being read.
    #[error("failed reading response body: {0}")]
    Body(#[from] std::io::Error),
}

impl TransportError {
    /// Check if this error is a client-side timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Network { source, .. } => source.is_timeout(),
            Self::Body(io) => {
                io.kind() == std::io::ErrorKind::TimedOut
                    || io
                        .get_ref()
                        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
                        .is_some_and(reqwest::Error::is_timeout)
            }
            _ => false,
        }
    }
}

/// Unified error type for every client operation.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a non-success status that is not the capacity signal.
    #[error("{url} responded {status} {status_text}")]
    Api { url: String, status: u16, status_text: String, body: String },

    /// Credentials were rejected. Never retried.
    #[error("authentication rejected by {url} ({status} {status_text})")]
    Authentication { url: String, status: u16, status_text: String },

    /// The capacity signal kept coming back until the attempt budget ran out.
    #[error("could not complete request to {url} within {attempts} attempts ({status} {status_text})")]
    RateLimitExhausted { url: String, attempts: u32, status: u16, status_text: String },

    /// Unexpected failures persisted through every transport retry.
    #[error("request failed after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<ClientError>,
    },

    /// A cursor sequence repeated or went backwards.
    #[error("pagination cursor {cursor} for {url} did not advance past {previous}")]
    NonIncreasingCursor { url: String, cursor: u64, previous: u64 },

    /// The service answered with an application-level error document.
    #[error("service error {code}: {message}")]
    Service { code: String, message: String },

    /// A document did not have the root element the caller expected.
    #[error("unexpected response document <{found}>, expected <{expected}>")]
    UnexpectedDocument { expected: &'static str, found: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] quick_xml::DeError),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Too many consumer failures before any success during a streamed parse.
    #[error("Exceeded iteratee error limit {limit}")]
    IterateeErrorLimit { limit: usize },

    /// A consumer callback failed during a paginated iteration.
    #[error("iteratee failed: {0}")]
    Iteratee(#[source] BoxError),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The record dispatch queue was closed while records were still being submitted.
    #[error("record dispatch queue closed")]
    DispatchClosed,
}

impl ClientError {
    /// Build the error for a non-success HTTP status.
    pub fn from_status(url: &str, status: u16, status_text: &str, body: String) -> Self {
        if status == 401 {
            return Self::Authentication {
                url: url.to_string(),
                status,
                status_text: status_text.to_string(),
            };
        }
        Self::Api { url: url.to_string(), status, status_text: status_text.to_string(), body }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. }
            | Self::Authentication { status, .. }
            | Self::RateLimitExhausted { status, .. } => Some(*status),
            Self::RetryExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Check if this error, or the last failure behind a retry exhaustion, is a client-side
    /// timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            Self::RetryExhausted { last, .. } => last.is_timeout(),
            _ => false,
        }
    }

    /// Check if this error is an authentication failure.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Decide whether a transport retry may repeat the request that produced this error.
    ///
    /// Only transport failures and HTTP errors outside `no_retry` qualify. Capacity exhaustion
    /// has its own attempt counter and is never retried a second time.
    pub fn is_retryable(&self, no_retry: &[u16]) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => !no_retry.contains(status),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> ClientError {
        ClientError::Transport(TransportError::Timeout {
            url: "https://qualysapi.example/api".into(),
            timeout: Duration::from_secs(5),
        })
    }

    #[test]
    fn unauthorized_status_maps_to_authentication() {
        let err = ClientError::from_status("https://x/msp/about.php", 401, "Unauthorized", String::new());
        assert!(err.is_authentication());
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_retryable(&[400, 401, 403]));
    }

    #[test]
    fn no_retry_statuses_are_not_retryable() {
        let bad = ClientError::from_status("u", 400, "Bad Request", String::new());
        let flaky = ClientError::from_status("u", 503, "Service Unavailable", String::new());
        assert!(!bad.is_retryable(&[400, 401, 403]));
        assert!(flaky.is_retryable(&[400, 401, 403]));
    }

    #[test]
    fn timeout_is_seen_through_retry_exhaustion() {
        let err = ClientError::RetryExhausted { attempts: 3, last: Box::new(timeout()) };
        assert!(err.is_timeout());
        assert!(timeout().is_retryable(&[]));
    }

    #[test]
    fn stalled_body_counts_as_timeout() {
        let stalled = std::io::Error::new(std::io::ErrorKind::TimedOut, "body stalled");
        let broken = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(ClientError::from(TransportError::Body(stalled)).is_timeout());
        assert!(!ClientError::from(TransportError::Body(broken)).is_timeout());
    }

    #[test]
    fn rate_limit_exhaustion_message_names_attempts() {
        let err = ClientError::RateLimitExhausted {
            url: "u".into(),
            attempts: 5,
            status: 409,
            status_text: "Conflict".into(),
        };
        assert!(err.to_string().contains("within 5 attempts"));
        assert!(!err.is_retryable(&[]));
    }

    #[test]
    fn iteratee_limit_message() {
        let err = ClientError::IterateeErrorLimit { limit: 2 };
        assert_eq!(err.to_string(), "Exceeded iteratee error limit 2");
    }
}
