//! Site adapter registry and shared scraping helpers.
//!
//! Each retailer lives in its own module and exposes an `adapter()` building
//! its [`SiteAdapter`]: static request parameters plus the three strategy
//! objects for category discovery, product listing and field extraction.

pub mod habsev;
pub mod panlight;
pub mod supraten;

use std::collections::{BTreeMap, HashSet};

use futures::future::{BoxFuture, FutureExt};
use scraper::{ElementRef, Selector};
use tracing::warn;

use crate::domain::product::CategoryNode;
use crate::domain::services::{PageFetcher, SiteAdapter};
use crate::domain::CrawlStage;
use crate::infrastructure::extraction::collapse_whitespace;

/// All supported sites keyed by name. Ordering is stable so runs process
/// sites in the same order every time.
pub fn registry() -> BTreeMap<&'static str, SiteAdapter> {
    let mut sites = BTreeMap::new();
    for adapter in [supraten::adapter(), habsev::adapter(), panlight::adapter()] {
        sites.insert(adapter.name, adapter);
    }
    sites
}

/// Compile a CSS selector known to be valid at build time.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("selector is valid css")
}

/// Concatenated text of an element with whitespace runs collapsed.
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Depth-first subcategory resolution shared by the sites whose category
/// pages link further category pages.
///
/// `parse` pulls `(name, url)` subcategory pairs out of one page body; a page
/// yielding none is a listing leaf. The visited set stops overlapping menus
/// from looping, and a branch whose page stays unreachable after retries is
/// dropped instead of failing the tree.
pub(crate) fn resolve_subtree<'a, P>(
    fetch: &'a dyn PageFetcher,
    body: String,
    visited: &'a mut HashSet<String>,
    parse: &'a P,
) -> BoxFuture<'a, Vec<CategoryNode>>
where
    P: Fn(&str) -> Vec<(String, String)> + Send + Sync,
{
    async move {
        let found = parse(&body);
        let mut children = Vec::new();
        for (name, url) in found {
            if !visited.insert(url.clone()) {
                continue;
            }
            match fetch.get_page(CrawlStage::ResolvingCategories, &url).await {
                Ok(sub_body) => {
                    let sub = resolve_subtree(fetch, sub_body, &mut *visited, parse).await;
                    children.push(CategoryNode::with_children(name, url, sub));
                }
                Err(error) => {
                    warn!(%error, url, name, "category branch unreachable, dropped");
                }
            }
        }
        children
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_every_site_once() {
        let sites = registry();
        assert_eq!(sites.len(), 3);
        for (key, adapter) in &sites {
            assert_eq!(*key, adapter.name);
            assert!(adapter.base_url.starts_with("https://"));
            assert_eq!(adapter.currency, "MDL");
        }
    }

    #[tokio::test]
    async fn overlapping_menus_do_not_loop() {
        struct Looping;

        #[async_trait::async_trait]
        impl PageFetcher for Looping {
            async fn get_page(&self, _stage: CrawlStage, url: &str) -> anyhow::Result<String> {
                // a links b, b links back to a
                Ok(match url {
                    "https://s/a" => "b https://s/b".to_string(),
                    "https://s/b" => "a https://s/a".to_string(),
                    _ => String::new(),
                })
            }
        }

        fn parse(body: &str) -> Vec<(String, String)> {
            body.lines()
                .filter_map(|line| line.split_once(' '))
                .map(|(n, u)| (n.to_string(), u.to_string()))
                .collect()
        }

        let mut visited = HashSet::from(["https://s/a".to_string()]);
        let children =
            resolve_subtree(&Looping, "b https://s/b".to_string(), &mut visited, &parse).await;
        assert_eq!(children.len(), 1);
        // The back-link to an already visited page is not followed.
        assert!(children[0].is_leaf());
        assert_eq!(visited.len(), 2);
    }

    #[test]
    fn element_text_collapses_markup_whitespace() {
        let html = scraper::Html::parse_fragment("<p>  a <b>b</b>\n c </p>");
        let sel = selector("p");
        let p = html.select(&sel).next().unwrap();
        assert_eq!(element_text(&p), "a b c");
    }
}
