//! Rate-limited HTTP fetcher with typed failure classification.
//!
//! One fetch is exactly one GET: no retry logic lives here. Failures are
//! classified into [`FetchError`] so the retry layer can decide what is
//! transient and what is final from data instead of string matching.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use reqwest::header::HeaderMap;
use reqwest::Client;
use thiserror::Error;

use crate::infrastructure::retry::ErrorClass;

/// HTTP client configuration for crawling.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HttpClientConfig {
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_requests_per_second: 7,
            follow_redirects: true,
        }
    }
}

/// Why a single fetch failed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out: {url}")]
    Timeout { url: String },

    #[error("connection failed: {url}: {message}")]
    Connection { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to read body from {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// Retry classification: transport failures, 5xx and 429 are worth
    /// another attempt; any other 4xx is a property of the URL and will not
    /// improve with retries.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout { .. } | Self::Connection { .. } | Self::Body { .. } => {
                ErrorClass::Retryable
            }
            Self::Status { status, .. } => {
                if *status >= 500 || *status == 429 {
                    ErrorClass::Retryable
                } else {
                    ErrorClass::Fatal
                }
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Status { status: 403, .. })
    }
}

/// Shared HTTP client with a process-wide request rate cap.
///
/// Pooling is an efficiency choice here, not a correctness requirement:
/// requests are independent and unordered, reqwest just reuses connections.
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpClient {
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .gzip(true)
            .brotli(true)
            .build()
            .context("failed to build HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("request rate must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    /// Fetch `url` with the given headers and return the body text.
    pub async fn get_text(&self, url: &str, headers: &HeaderMap) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;

        tracing::debug!(url, "fetching");

        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| classify_transport_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

fn classify_transport_error(url: &str, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Connection {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_defaults() {
        let client = HttpClient::new(&HttpClientConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn zero_rate_is_rejected() {
        let config = HttpClientConfig {
            max_requests_per_second: 0,
            ..Default::default()
        };
        assert!(HttpClient::new(&config).is_err());
    }

    #[test]
    fn status_classification() {
        let not_found = FetchError::Status {
            status: 404,
            url: "https://site/p".into(),
        };
        assert_eq!(not_found.class(), ErrorClass::Fatal);
        assert!(not_found.is_not_found());

        let forbidden = FetchError::Status {
            status: 403,
            url: "https://site/p".into(),
        };
        assert_eq!(forbidden.class(), ErrorClass::Fatal);
        assert!(forbidden.is_forbidden());

        let server = FetchError::Status {
            status: 503,
            url: "https://site/p".into(),
        };
        assert_eq!(server.class(), ErrorClass::Retryable);

        let rate_limited = FetchError::Status {
            status: 429,
            url: "https://site/p".into(),
        };
        assert_eq!(rate_limited.class(), ErrorClass::Retryable);
    }

    #[test]
    fn transport_errors_are_retryable() {
        let timeout = FetchError::Timeout {
            url: "https://site/p".into(),
        };
        assert_eq!(timeout.class(), ErrorClass::Retryable);

        let connection = FetchError::Connection {
            url: "https://site/p".into(),
            message: "connection refused".into(),
        };
        assert_eq!(connection.class(), ErrorClass::Retryable);
    }

    #[test]
    fn status_helper_does_not_match_other_codes() {
        let gone = FetchError::Status {
            status: 410,
            url: "https://site/p".into(),
        };
        assert!(!gone.is_not_found());
        assert!(!gone.is_forbidden());
    }
}
