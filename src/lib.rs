//! pricewatch: multi-site retail catalog crawler with price history.
//!
//! The pipeline per site: resolve the category tree, enumerate product URLs
//! across paginated listings, fetch and extract product pages, then merge
//! the run into a JSON snapshot that tracks each product's price over time.
//! Sites plug in as [`domain::SiteAdapter`] capability sets; all network
//! traffic flows through one rate-limited, retried, concurrency-gated
//! fetcher.
//!
//! Layers follow a clean-architecture split:
//! - [`domain`]: catalog types and the strategy traits.
//! - [`infrastructure`]: HTTP, retry, gating, scraping, config, logging.
//! - [`application`]: the orchestrator driving a run and the snapshot sink.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{run_pass, CrawlOrchestrator, SheetSink, SnapshotSink};
pub use domain::{CrawlReport, CrawlResult, CrawlStage, ProductRecord, SiteAdapter};
pub use infrastructure::{AppConfig, FetchError, HttpClient, RetryPolicy, SiteClient, StageGates};
