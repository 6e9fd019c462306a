//! Pagination drivers shared by the site listers.
//!
//! Two schemes cover every supported site: a counted scheme where the first
//! page reveals how many pages exist, and a sentinel scheme that walks pages
//! until one comes back empty. Both run through the [`PageFetcher`] seam, so
//! the listing-stage gate bounds their fan-out.

use anyhow::Result;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::domain::services::PageFetcher;
use crate::domain::CrawlStage;

/// Hard cap on sentinel walks; guarantees termination even on a site whose
/// every page claims products.
pub const DEFAULT_SENTINEL_PAGE_CAP: u32 = 100;

/// Counted pagination: fetch pages `1..=total_pages` concurrently (the
/// listing gate inside the fetcher bounds the fan-out) and collect the links
/// each page yields. A page that fails after retries is logged and skipped;
/// the category degrades to whatever pages did arrive.
pub async fn paginate_counted<B, P>(
    fetch: &dyn PageFetcher,
    total_pages: u32,
    build_url: B,
    parse_page: P,
) -> Result<Vec<String>>
where
    B: Fn(u32) -> String,
    P: Fn(&str) -> Vec<String>,
{
    let futures: Vec<_> = (1..=total_pages)
        .map(|page| {
            let url = build_url(page);
            async move {
                match fetch.get_page(CrawlStage::ListingProducts, &url).await {
                    Ok(body) => Some(body),
                    Err(error) => {
                        warn!(%error, url, page, "listing page lost, skipping");
                        None
                    }
                }
            }
        })
        .collect();

    let mut links = Vec::new();
    for body in join_all(futures).await.into_iter().flatten() {
        links.extend(parse_page(&body));
    }
    debug!(total_pages, links = links.len(), "counted pagination done");
    Ok(links)
}

/// Sentinel pagination: fetch pages sequentially from 1 until a page parses
/// to zero products, bounded by `page_cap`. A fetch failure ends the walk —
/// with no total known there is no way to tell a hole from the end.
pub async fn paginate_sentinel<B, P>(
    fetch: &dyn PageFetcher,
    page_cap: u32,
    build_url: B,
    parse_page: P,
) -> Result<Vec<String>>
where
    B: Fn(u32) -> String,
    P: Fn(&str) -> Vec<String>,
{
    let mut links = Vec::new();
    for page in 1..=page_cap.max(1) {
        let url = build_url(page);
        let body = match fetch.get_page(CrawlStage::ListingProducts, &url).await {
            Ok(body) => body,
            Err(error) => {
                warn!(%error, url, page, "sentinel walk stopped by fetch failure");
                break;
            }
        };
        let page_links = parse_page(&body);
        if page_links.is_empty() {
            debug!(page, "empty page, sentinel walk complete");
            break;
        }
        links.extend(page_links);
    }
    Ok(links)
}

/// Number of pages needed for `total_items` at `per_page` items each.
pub fn pages_for(total_items: u32, per_page: u32) -> u32 {
    total_items.div_ceil(per_page.max(1))
}
