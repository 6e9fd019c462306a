//! Per-site crawl pipeline: category tree, product listing, detail
//! extraction, degradation accounting.
//!
//! Every stage degrades instead of aborting: an unreachable category becomes
//! an empty subtree, a lost listing page loses its products, an exhausted or
//! mismatched product page is simply absent from the result. The only hard
//! error a run can return is a category selection pointing outside the
//! site's menu, which is an operator mistake rather than a network one.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::product::{CategoryNode, CrawlReport, CrawlResult};
use crate::domain::services::{PageFetcher, SiteAdapter};
use crate::domain::CrawlStage;
use crate::infrastructure::config::ConfigError;

/// Runs the full pipeline for one site.
pub struct CrawlOrchestrator {
    site: SiteAdapter,
    fetcher: Arc<dyn PageFetcher>,
    cancel: CancellationToken,
}

enum DetailOutcome {
    Extracted(String, crate::domain::product::ProductRecord),
    ShapeMismatch,
    FetchFailed,
    Cancelled,
}

impl CrawlOrchestrator {
    pub fn new(
        site: SiteAdapter,
        fetcher: Arc<dyn PageFetcher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            site,
            fetcher,
            cancel,
        }
    }

    /// Crawl the site's categories selected by 1-based `category_indices`
    /// into the top-level menu; an empty selection means every category.
    pub async fn run(&self, category_indices: &[usize]) -> Result<CrawlReport, ConfigError> {
        let started = Instant::now();
        info!(site = self.site.name, "crawl run starting");

        // Stage 1: category tree.
        let menu = match self
            .site
            .resolver
            .resolve(self.fetcher.as_ref(), self.site.base_url)
            .await
        {
            Ok(menu) => menu,
            Err(error) => {
                warn!(site = self.site.name, %error, "category menu unreachable");
                return Ok(self.report(CrawlStage::Failed, started, 0, 0, 0, 0, CrawlResult::new()));
            }
        };
        let selected = self.select_categories(&menu, category_indices)?;

        let mut leaves: Vec<CategoryNode> = Vec::new();
        for category in &selected {
            if self.cancel.is_cancelled() {
                return Ok(self.report(
                    CrawlStage::ResolvingCategories,
                    started,
                    0,
                    0,
                    0,
                    0,
                    CrawlResult::new(),
                ));
            }
            match self
                .site
                .resolver
                .resolve(self.fetcher.as_ref(), &category.url)
                .await
            {
                Ok(subtree) => {
                    leaves.extend(subtree.leaves().into_iter().cloned());
                }
                Err(error) => {
                    warn!(
                        site = self.site.name,
                        category = %category.name,
                        %error,
                        "category subtree unreachable, skipped"
                    );
                }
            }
        }
        info!(
            site = self.site.name,
            categories = selected.len(),
            leaves = leaves.len(),
            "category tree resolved"
        );

        // Stage 2: product URL enumeration across all leaves.
        let listings = join_all(leaves.iter().map(|leaf| {
            let fetcher = Arc::clone(&self.fetcher);
            let lister = Arc::clone(&self.site.lister);
            async move {
                match lister.list(fetcher.as_ref(), &leaf.url).await {
                    Ok(urls) => urls,
                    Err(error) => {
                        warn!(leaf = %leaf.url, %error, "listing lost, skipped");
                        Vec::new()
                    }
                }
            }
        }))
        .await;

        let mut seen = HashSet::new();
        let mut product_urls = Vec::new();
        for url in listings.into_iter().flatten() {
            if seen.insert(url.clone()) {
                product_urls.push(url);
            }
        }
        let discovered = product_urls.len();
        info!(site = self.site.name, discovered, "product urls enumerated");

        if self.cancel.is_cancelled() {
            return Ok(self.report(
                CrawlStage::ListingProducts,
                started,
                leaves.len(),
                discovered,
                0,
                0,
                CrawlResult::new(),
            ));
        }

        // Stage 3: detail pages. One task per URL; the detail gate inside the
        // fetcher bounds actual concurrency.
        let tasks: Vec<_> = product_urls
            .into_iter()
            .map(|url| {
                let fetcher = Arc::clone(&self.fetcher);
                let extractor = Arc::clone(&self.site.extractor);
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    if cancel.is_cancelled() {
                        return DetailOutcome::Cancelled;
                    }
                    let body = match fetcher
                        .get_page(CrawlStage::ExtractingProducts, &url)
                        .await
                    {
                        Ok(body) => body,
                        Err(error) => {
                            warn!(url, %error, "product page lost");
                            return DetailOutcome::FetchFailed;
                        }
                    };
                    match extractor.extract(&body) {
                        Some(record) => DetailOutcome::Extracted(url, record),
                        None => {
                            warn!(url, "page shape mismatch, skipped");
                            DetailOutcome::ShapeMismatch
                        }
                    }
                })
            })
            .collect();

        let mut result = CrawlResult::new();
        let mut shape_mismatches = 0;
        let mut fetch_failures = 0;
        let mut cancelled = false;
        for task in join_all(tasks).await {
            match task {
                Ok(DetailOutcome::Extracted(url, record)) => {
                    result.insert(url, record);
                }
                Ok(DetailOutcome::ShapeMismatch) => shape_mismatches += 1,
                Ok(DetailOutcome::FetchFailed) => fetch_failures += 1,
                Ok(DetailOutcome::Cancelled) => cancelled = true,
                Err(error) => {
                    warn!(%error, "detail task panicked");
                    fetch_failures += 1;
                }
            }
        }

        let stage = if cancelled {
            CrawlStage::ExtractingProducts
        } else {
            CrawlStage::Done
        };
        let report = self.report(
            stage,
            started,
            leaves.len(),
            discovered,
            shape_mismatches,
            fetch_failures,
            result,
        );
        info!(
            site = self.site.name,
            stage = %report.stage,
            extracted = report.extracted,
            shape_mismatches,
            fetch_failures,
            duration_s = report.duration.as_secs(),
            "crawl run finished"
        );
        Ok(report)
    }

    /// Pick top-level categories by 1-based index; empty selection means all.
    fn select_categories(
        &self,
        menu: &CategoryNode,
        indices: &[usize],
    ) -> Result<Vec<CategoryNode>, ConfigError> {
        if indices.is_empty() {
            return Ok(menu.children.clone());
        }
        indices
            .iter()
            .map(|&index| {
                index
                    .checked_sub(1)
                    .and_then(|i| menu.children.get(i))
                    .cloned()
                    .ok_or_else(|| ConfigError::InvalidCategoryIndex {
                        site: self.site.name.to_string(),
                        index,
                        available: menu.children.len(),
                    })
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        stage: CrawlStage,
        started: Instant,
        listing_pages: usize,
        discovered: usize,
        shape_mismatches: usize,
        fetch_failures: usize,
        result: CrawlResult,
    ) -> CrawlReport {
        CrawlReport {
            site: self.site.name.to_string(),
            stage,
            listing_pages,
            discovered,
            extracted: result.len(),
            shape_mismatches,
            fetch_failures,
            duration: started.elapsed(),
            finished_at: Utc::now(),
            result,
        }
    }
}
