//! Typed client configuration.
//!
//! Loading and validating credentials is the embedding application's job; this module only
//! defines the values the client consumes and their defaults. Every struct deserializes with
//! serde (durations in humantime notation, e.g. `"90s"`), so it can be embedded in whatever
//! config format the application uses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::ClientError;
use crate::rate_limit::RateLimitConfig;
use crate::retry::RetryConfig;

/// The single static credential pair the API accepts.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Page and batch sizes, dispatch concurrency and the streaming error budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub web_app_page_size: u32,
    pub finding_page_size: u32,
    /// Step the finding page size shrinks by after a timeout.
    pub finding_page_decrement: u32,
    pub finding_min_page_size: u32,
    /// `truncation_limit` for legacy host id listings.
    pub host_id_page_size: u32,
    pub host_detail_batch_size: usize,
    pub detection_batch_size: usize,
    pub vulnerability_batch_size: usize,
    /// Consumer callbacks allowed to run at once per detection batch.
    pub detection_concurrency: usize,
    /// Consumer failures tolerated before the first success in a detection batch.
    pub iteratee_error_limit: Option<usize>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            web_app_page_size: 100,
            finding_page_size: 300,
            finding_page_decrement: 100,
            finding_min_page_size: 50,
            host_id_page_size: 10_000,
            host_detail_batch_size: 100,
            detection_batch_size: 300,
            vulnerability_batch_size: 500,
            detection_concurrency: 1,
            iteratee_error_limit: Some(10),
        }
    }
}

/// Everything a [`Client`](crate::Client) needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Platform API root, e.g. `https://qualysapi.qg3.apps.qualys.com`.
    pub api_url: Url,
    pub credentials: Credentials,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

fn default_user_agent() -> String {
    concat!("qualys-client/", env!("CARGO_PKG_VERSION")).to_string()
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

impl ClientConfig {
    /// Configuration with default policies.
    pub fn new(api_url: Url, credentials: Credentials) -> Self {
        Self {
            api_url,
            credentials,
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            pagination: PaginationConfig::default(),
        }
    }

    /// Reject values the engine cannot make progress with.
    pub fn validate(&self) -> Result<(), ClientError> {
        let p = &self.pagination;
        let checks: [(&str, bool); 10] = [
            ("rate_limit.max_attempts", self.rate_limit.max_attempts > 0),
            ("retry.max_attempts", self.retry.max_attempts > 0),
            ("pagination.web_app_page_size", p.web_app_page_size > 0),
            ("pagination.finding_page_size", p.finding_page_size > 0),
            ("pagination.finding_min_page_size", p.finding_min_page_size > 0),
            ("pagination.host_id_page_size", p.host_id_page_size > 0),
            ("pagination.host_detail_batch_size", p.host_detail_batch_size > 0),
            ("pagination.detection_batch_size", p.detection_batch_size > 0),
            ("pagination.vulnerability_batch_size", p.vulnerability_batch_size > 0),
            ("pagination.detection_concurrency", p.detection_concurrency > 0),
        ];
        if let Some((field, _)) = checks.iter().find(|(_, ok)| !ok) {
            return Err(ClientError::Config(format!("{field} must be greater than zero")));
        }
        if self.credentials.username.is_empty() {
            return Err(ClientError::Config("credentials.username must not be empty".into()));
        }
        Ok(())
    }

    /// Resolve an API path against [`Self::api_url`].
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.api_url
            .join(path)
            .map_err(|e| ClientError::Config(format!("invalid endpoint {path}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new(
            Url::parse("https://qualysapi.example.com").unwrap(),
            Credentials::new("user", "secret"),
        )
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "api_url": "https://qualysapi.example.com",
                "credentials": { "username": "user", "password": "secret" },
                "request_timeout": "90s",
                "rate_limit": { "reserve_limit": 10 },
                "pagination": { "detection_concurrency": 4 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.request_timeout, Duration::from_secs(90));
        assert_eq!(config.rate_limit.reserve_limit, 10);
        assert_eq!(config.rate_limit.response_code, 409);
        assert_eq!(config.pagination.detection_concurrency, 4);
        assert_eq!(config.pagination.detection_batch_size, 300);
        assert_eq!(config.retry.no_retry, vec![400, 401, 403]);
        config.validate().unwrap();
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", config());
        assert!(rendered.contains("user"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let mut config = config();
        config.pagination.detection_batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("detection_batch_size"));
    }

    #[test]
    fn endpoint_joins_paths() {
        let url = config().endpoint("/api/2.0/fo/asset/host/").unwrap();
        assert_eq!(url.as_str(), "https://qualysapi.example.com/api/2.0/fo/asset/host/");
    }
}
