//! Infrastructure layer: HTTP fetching, retry and concurrency control,
//! scraping helpers, configuration and logging.

pub mod config;
pub mod extraction;
pub mod gate;
pub mod http_client;
pub mod logging;
pub mod pagination;
pub mod retry;
pub mod site_client;
pub mod sites;

pub use config::{AppConfig, ConfigError};
pub use gate::{ConcurrencyGate, StageGates};
pub use http_client::{FetchError, HttpClient, HttpClientConfig};
pub use retry::{ErrorClass, RetryPolicy};
pub use site_client::SiteClient;
