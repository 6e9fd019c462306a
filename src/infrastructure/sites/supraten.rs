//! supraten.md: header-menu category tree, counted 90-per-page listings,
//! single-product pages under `div.sp-page-content`.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::warn;

use crate::domain::product::{
    CategoryNode, ProductRecord, FIELD_CATEGORY, FIELD_PRICE, FIELD_SKU, FIELD_TITLE,
};
use crate::domain::services::{
    CategoryResolver, PageFetcher, ProductExtractor, ProductLister, SiteAdapter,
};
use crate::domain::CrawlStage;
use crate::infrastructure::extraction::{first_number, normalize_price, normalize_record_title};
use crate::infrastructure::pagination::{pages_for, paginate_counted};
use crate::infrastructure::sites::{element_text, resolve_subtree, selector};

const NAME: &str = "supraten";
const BASE_URL: &str = "https://supraten.md/";
const PRODUCTS_PER_PAGE: u32 = 90;

const HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    ),
    ("accept-language", "ru-RU,ru;q=0.8"),
];

static MENU_LINK: Lazy<Selector> =
    Lazy::new(|| selector("ul.sp-header-menu-category__list a.sp-header-menu-category__link"));
static SUBCATEGORY_LINK: Lazy<Selector> =
    Lazy::new(|| selector("div.row.sp-category-list a.sp-category-list__title"));
static TOTAL_COUNTER: Lazy<Selector> = Lazy::new(|| selector("span.c-second-gray.fs-14"));
static PRODUCT_CARD_LINK: Lazy<Selector> =
    Lazy::new(|| selector("div.sp-products div.sp-show-product-vertical a"));
static PAGE_ANCHOR: Lazy<Selector> = Lazy::new(|| selector("div.sp-page-content"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("h1.sp-single-product__title"));
static SKU: Lazy<Selector> = Lazy::new(|| selector("div.sp-single-product__sku"));
static BREADCRUMB_ITEM: Lazy<Selector> =
    Lazy::new(|| selector("ul.sp-breadcrumbs__list li.sp-breadcrumbs__item"));
static PRICE: Lazy<Selector> = Lazy::new(|| selector("p.sp-single-product__price-current"));
static CHARACTERISTIC_ROW: Lazy<Selector> =
    Lazy::new(|| selector("#characteristic table.table-bordered tbody tr"));
static CELL: Lazy<Selector> = Lazy::new(|| selector("td"));

pub fn adapter() -> SiteAdapter {
    SiteAdapter {
        name: NAME,
        base_url: BASE_URL,
        currency: "MDL",
        headers: HEADERS,
        cookies: &[],
        resolver: Arc::new(SupratenResolver),
        lister: Arc::new(SupratenLister),
        extractor: Arc::new(SupratenExtractor),
    }
}

fn named_links(body: &str, sel: &Selector) -> Vec<(String, String)> {
    let html = Html::parse_document(body);
    html.select(sel)
        .filter_map(|link| {
            let href = link.value().attr("href")?.trim().to_string();
            let name = element_text(&link);
            (!name.is_empty() && !href.is_empty()).then_some((name, href))
        })
        .collect()
}

/// Top-level categories come from the home-page header menu; deeper pages
/// link subcategories until a page without the category-list container
/// remains as a listing leaf.
pub struct SupratenResolver;

#[async_trait]
impl CategoryResolver for SupratenResolver {
    async fn resolve(&self, fetch: &dyn PageFetcher, seed_url: &str) -> Result<CategoryNode> {
        let body = fetch
            .get_page(CrawlStage::ResolvingCategories, seed_url)
            .await?;
        let menu = named_links(&body, &MENU_LINK);
        if !menu.is_empty() {
            let children = menu
                .into_iter()
                .map(|(name, url)| CategoryNode::new(name, url))
                .collect();
            return Ok(CategoryNode::with_children(NAME, seed_url, children));
        }
        let mut visited = HashSet::from([seed_url.to_string()]);
        let children = resolve_subtree(fetch, body, &mut visited, &|page: &str| {
            named_links(page, &SUBCATEGORY_LINK)
        })
        .await;
        Ok(CategoryNode::with_children(seed_url, seed_url, children))
    }
}

/// Counted pagination: the first page carries a total-products counter, 90
/// products per page.
pub struct SupratenLister;

fn listing_url(category_url: &str, page: u32) -> String {
    format!("{category_url}?limit={PRODUCTS_PER_PAGE}&page={page}")
}

fn product_links(body: &str) -> Vec<String> {
    let html = Html::parse_document(body);
    html.select(&PRODUCT_CARD_LINK)
        .filter_map(|link| link.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect()
}

#[async_trait]
impl ProductLister for SupratenLister {
    async fn list(&self, fetch: &dyn PageFetcher, category_url: &str) -> Result<Vec<String>> {
        let first = fetch
            .get_page(CrawlStage::ListingProducts, &listing_url(category_url, 1))
            .await?;
        let total = {
            let html = Html::parse_document(&first);
            html.select(&TOTAL_COUNTER)
                .next()
                .and_then(|counter| first_number(&element_text(&counter)))
        };
        let Some(total) = total else {
            warn!(category_url, "no product counter on listing page");
            return Ok(Vec::new());
        };
        let total_pages = pages_for(total, PRODUCTS_PER_PAGE);
        paginate_counted(
            fetch,
            total_pages,
            |page| listing_url(category_url, page),
            product_links,
        )
        .await
    }
}

/// Field extraction anchored on `div.sp-page-content`; characteristic table
/// rows become extra fields keyed by their left cell.
pub struct SupratenExtractor;

impl ProductExtractor for SupratenExtractor {
    fn extract(&self, body: &str) -> Option<ProductRecord> {
        let html = Html::parse_document(body);
        let page = html.select(&PAGE_ANCHOR).next()?;
        let title = page.select(&TITLE).next().map(|el| element_text(&el))?;

        let mut record = ProductRecord::new();
        record.insert(FIELD_TITLE, title);
        if let Some(sku) = page.select(&SKU).next() {
            let text = element_text(&sku);
            if let Some(value) = text.rsplit(':').next() {
                record.insert(FIELD_SKU, value.trim());
            }
        }
        let crumbs: Vec<_> = html.select(&BREADCRUMB_ITEM).collect();
        if crumbs.len() >= 2 {
            record.insert(FIELD_CATEGORY, element_text(&crumbs[crumbs.len() - 2]));
        }
        if let Some(price) = page
            .select(&PRICE)
            .next()
            .and_then(|el| normalize_price(&element_text(&el)))
        {
            record.insert(FIELD_PRICE, price);
        }
        for row in page.select(&CHARACTERISTIC_ROW) {
            let cells: Vec<_> = row.select(&CELL).collect();
            if cells.len() >= 2 {
                record.insert(element_text(&cells[0]), element_text(&cells[1]));
            }
        }
        normalize_record_title(&mut record);
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::FieldValue;

    const PRODUCT_PAGE: &str = r#"
        <html><body>
        <ul class="sp-breadcrumbs__list">
          <li class="sp-breadcrumbs__item">Главная</li>
          <li class="sp-breadcrumbs__item">Кабельная продукция</li>
          <li class="sp-breadcrumbs__item">Кабель ВВГ 3x1.5</li>
        </ul>
        <div class="sp-page-content">
          <h1 class="sp-single-product__title">Светодиодная лампа 10Вт</h1>
          <div class="sp-single-product__sku">Артикул: SP-4455</div>
          <p class="sp-single-product__price-current">45.90 лей / шт.</p>
          <div id="characteristic">
            <table class="table table-bordered"><tbody>
              <tr><td>Мощность</td><td>10 Вт</td></tr>
              <tr><td>Цоколь</td><td>E27</td></tr>
            </tbody></table>
          </div>
        </div>
        </body></html>"#;

    #[test]
    fn extracts_canonical_and_characteristic_fields() {
        let record = SupratenExtractor.extract(PRODUCT_PAGE).unwrap();
        assert_eq!(record.title(), Some("LED лампа 10W"));
        assert_eq!(record.price(), Some("45,90"));
        assert_eq!(
            record.get(FIELD_SKU),
            Some(&FieldValue::Single("SP-4455".into()))
        );
        assert_eq!(
            record.get(FIELD_CATEGORY),
            Some(&FieldValue::Single("Кабельная продукция".into()))
        );
        assert_eq!(
            record.get("Цоколь"),
            Some(&FieldValue::Single("E27".into()))
        );
    }

    #[test]
    fn page_without_product_anchor_is_a_mismatch() {
        assert!(SupratenExtractor
            .extract("<html><body><h1>404</h1></body></html>")
            .is_none());
    }

    #[test]
    fn listing_parse_returns_card_links() {
        let body = r#"
            <div class="sp-products">
              <div class="sp-show-product-vertical"><a href="https://supraten.md/p/1">x</a></div>
              <div class="sp-show-product-vertical"><a href="https://supraten.md/p/2">y</a></div>
            </div>"#;
        assert_eq!(
            product_links(body),
            vec![
                "https://supraten.md/p/1".to_string(),
                "https://supraten.md/p/2".to_string()
            ]
        );
    }

    #[test]
    fn listing_urls_carry_page_size() {
        assert_eq!(
            listing_url("https://supraten.md/c/kabel", 3),
            "https://supraten.md/c/kabel?limit=90&page=3"
        );
    }
}
