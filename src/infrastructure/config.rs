//! Application configuration: a JSON file of nested sections with full
//! defaults, created on first run so users always have a file to edit.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::infrastructure::gate::StageGates;
use crate::infrastructure::http_client::HttpClientConfig;
use crate::infrastructure::retry::RetryPolicy;
use crate::infrastructure::sites;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("config serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("site {site}: category index {index} out of range, {available} categories available")]
    InvalidCategoryIndex {
        site: String,
        index: usize,
        available: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: true,
            dir: "logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub request_timeout_secs: u64,
    pub max_requests_per_second: u32,
    pub category_concurrency: usize,
    pub listing_concurrency: usize,
    pub detail_concurrency: usize,
    pub max_retries: u32,
    pub retry_base_delay_secs: u64,
    pub retry_jitter_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_requests_per_second: 7,
            category_concurrency: 4,
            listing_concurrency: 8,
            detail_concurrency: 16,
            max_retries: 3,
            retry_base_delay_secs: 5,
            retry_jitter_ms: 1_000,
        }
    }
}

impl CrawlerConfig {
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout_seconds: self.request_timeout_secs,
            max_requests_per_second: self.max_requests_per_second,
            follow_redirects: true,
        }
    }

    /// Retry policy for one site, with the site's overrides applied.
    pub fn retry_policy(&self, site: &SiteSettings) -> RetryPolicy {
        RetryPolicy::new(
            site.max_retries.unwrap_or(self.max_retries),
            Duration::from_secs(
                site.retry_base_delay_secs
                    .unwrap_or(self.retry_base_delay_secs),
            ),
            self.retry_jitter_ms,
        )
    }

    /// Stage gates for one site, with the site's overrides applied.
    pub fn stage_gates(&self, site: &SiteSettings) -> StageGates {
        StageGates::new(
            self.category_concurrency,
            self.listing_concurrency,
            site.detail_concurrency.unwrap_or(self.detail_concurrency),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub output_dir: String,
    /// Seconds between scheduled runs; absent means run once and exit.
    pub repeat_secs: Option<u64>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            output_dir: "snapshots".to_string(),
            repeat_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub enabled: bool,
    /// 1-based indices into the site's top-level category list;
    /// empty means crawl every category.
    pub categories: Vec<usize>,
    /// Per-site overrides of the crawler defaults.
    pub max_retries: Option<u32>,
    pub retry_base_delay_secs: Option<u64>,
    pub detail_concurrency: Option<usize>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            categories: Vec::new(),
            max_retries: None,
            retry_base_delay_secs: None,
            detail_concurrency: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub crawler: CrawlerConfig,
    pub sink: SinkConfig,
    pub sites: BTreeMap<String, SiteSettings>,
}

impl AppConfig {
    /// Defaults with every registered site enabled on all categories.
    pub fn with_default_sites() -> Self {
        let sites = sites::registry()
            .keys()
            .map(|name| (name.to_string(), SiteSettings::default()))
            .collect();
        Self {
            sites,
            ..Self::default()
        }
    }

    /// Read the config file, or write the defaults there when it does not
    /// exist yet.
    pub async fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if tokio::fs::try_exists(path).await? {
            let raw = tokio::fs::read_to_string(path).await?;
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })
        } else {
            let config = Self::with_default_sites();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, serde_json::to_string_pretty(&config)?).await?;
            info!(path = %path.display(), "wrote default config");
            Ok(config)
        }
    }

    /// Settings for one site, falling back to defaults when the file has no
    /// entry for it.
    pub fn site(&self, name: &str) -> SiteSettings {
        self.sites.get(name).cloned().unwrap_or_default()
    }
}
