//! Service traits that define the seams of the crawl pipeline.
//!
//! Each site plugs in as a capability set — three strategy objects plus the
//! static request parameters — rather than a subclass hierarchy. All fetching
//! goes through [`PageFetcher`], so gating, retries and rate limiting stay in
//! one place and the whole pipeline can run offline in tests.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::events::CrawlStage;
use crate::domain::product::{CategoryNode, ProductRecord};

/// Performs one gated, retried page fetch for a given pipeline stage.
///
/// Implementations decide how the stage maps to a concurrency limit; the
/// production implementation is `infrastructure::SiteClient`.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the response body. An error means the unit of
    /// work is lost: retries (if any) have already been exhausted inside.
    async fn get_page(&self, stage: CrawlStage, url: &str) -> Result<String>;
}

/// Turns a seed URL into a category tree.
///
/// Resolving the site's base URL yields the top-level menu; resolving a
/// category URL recurses into subcategories until pages with no subcategory
/// marker remain as leaves. Implementations must keep a per-call visited set
/// so overlapping menus cannot loop, and must degrade an unfetchable branch
/// to an empty subtree instead of failing the run.
#[async_trait]
pub trait CategoryResolver: Send + Sync {
    async fn resolve(&self, fetch: &dyn PageFetcher, seed_url: &str) -> Result<CategoryNode>;
}

/// Paginates one listing page into product URLs.
///
/// The returned list may contain duplicates (a product pinned on several
/// pages); the orchestrator dedupes across all categories of a run.
#[async_trait]
pub trait ProductLister: Send + Sync {
    async fn list(&self, fetch: &dyn PageFetcher, category_url: &str) -> Result<Vec<String>>;
}

/// Parses one product page body into a flat field mapping.
///
/// `None` means the page does not match the expected product shape (missing
/// markup anchor). That is a content mismatch, not a transient failure: the
/// URL is skipped and never retried.
pub trait ProductExtractor: Send + Sync {
    fn extract(&self, body: &str) -> Option<ProductRecord>;
}

/// Everything the pipeline needs to crawl one retailer.
#[derive(Clone)]
pub struct SiteAdapter {
    pub name: &'static str,
    pub base_url: &'static str,
    /// Currency label passed through to the sink.
    pub currency: &'static str,
    /// Default request headers sent with every fetch.
    pub headers: &'static [(&'static str, &'static str)],
    /// Cookie pairs sent with every fetch.
    pub cookies: &'static [(&'static str, &'static str)],
    pub resolver: Arc<dyn CategoryResolver>,
    pub lister: Arc<dyn ProductLister>,
    pub extractor: Arc<dyn ProductExtractor>,
}

impl std::fmt::Debug for SiteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteAdapter")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}
