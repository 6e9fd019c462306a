//! Per-site fetch composition: HTTP client + retry policy + stage gates +
//! the site's default headers and cookies, behind the [`PageFetcher`] seam.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, USER_AGENT};

use crate::domain::services::{PageFetcher, SiteAdapter};
use crate::domain::CrawlStage;
use crate::infrastructure::gate::StageGates;
use crate::infrastructure::http_client::{FetchError, HttpClient};
use crate::infrastructure::retry::RetryPolicy;

/// Desktop user agents rotated per request so long runs do not present one
/// fingerprint for thousands of fetches.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

pub fn random_user_agent() -> &'static str {
    USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
}

/// Fetch front-end for one site. Every `get_page` call takes a slot from the
/// stage's gate, then runs the retry-wrapped rate-limited GET with the
/// site's headers and cookies plus a freshly rotated user agent.
pub struct SiteClient {
    http: Arc<HttpClient>,
    retry: RetryPolicy,
    gates: StageGates,
    base_headers: HeaderMap,
}

impl SiteClient {
    pub fn new(
        http: Arc<HttpClient>,
        retry: RetryPolicy,
        gates: StageGates,
        site: &SiteAdapter,
    ) -> Result<Self> {
        let mut base_headers = HeaderMap::new();
        for (name, value) in site.headers {
            let name: HeaderName = name
                .parse()
                .with_context(|| format!("invalid header name for {}: {name}", site.name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid header value for {}: {name}", site.name))?;
            base_headers.insert(name, value);
        }
        if !site.cookies.is_empty() {
            let cookie_line = site
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            base_headers.insert(
                COOKIE,
                HeaderValue::from_str(&cookie_line)
                    .with_context(|| format!("invalid cookie value for {}", site.name))?,
            );
        }
        Ok(Self {
            http,
            retry,
            gates,
            base_headers,
        })
    }

    fn attempt_headers(&self) -> HeaderMap {
        let mut headers = self.base_headers.clone();
        headers.insert(USER_AGENT, HeaderValue::from_static(random_user_agent()));
        headers
    }
}

#[async_trait]
impl PageFetcher for SiteClient {
    async fn get_page(&self, stage: CrawlStage, url: &str) -> Result<String> {
        let _permit = self.gates.for_stage(stage).admit().await;
        let body = self
            .retry
            .execute(url, FetchError::class, || {
                let headers = self.attempt_headers();
                let http = Arc::clone(&self.http);
                async move { http.get_text(url, &headers).await }
            })
            .await
            .with_context(|| format!("giving up on {url}"))?;
        Ok(body)
    }
}
