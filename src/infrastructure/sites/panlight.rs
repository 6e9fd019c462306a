//! panlight.md: one-level catalog sections, sentinel pagination (pages are
//! walked until one renders no product cards), product pages under
//! `div.product-page-inner`. The `count_per_page` cookie pins the server-side
//! page size the pagination relies on.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::domain::product::{
    CategoryNode, ProductRecord, FIELD_CATEGORY, FIELD_PRICE, FIELD_SKU, FIELD_TITLE,
};
use crate::domain::services::{
    CategoryResolver, PageFetcher, ProductExtractor, ProductLister, SiteAdapter,
};
use crate::domain::CrawlStage;
use crate::infrastructure::extraction::{normalize_price, normalize_record_title};
use crate::infrastructure::pagination::{paginate_sentinel, DEFAULT_SENTINEL_PAGE_CAP};
use crate::infrastructure::sites::{element_text, selector};

const NAME: &str = "panlight";
const BASE_URL: &str = "https://www.panlight.md/ru";

const HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    ),
    ("accept-language", "ru-RU,ru;q=0.7"),
];

const COOKIES: &[(&str, &str)] = &[(
    "count_per_page",
    "eyJpdiI6ImpmMlNxdnFaeE01MHpSRXdEQmdCeXc9PSIsInZhbHVlIjoiUG9DQ2RCelEzdFZsc2xPN3ll\
     bk1mWkJORGQyanAvMGV1Q0E5ais0cHlXMTM3VFFkUFF6TzlEd1VyUUd3MGw0TCIsIm1hYyI6IjU2OGZh\
     NjRlNDBlNjAxMmU5N2UzY2E2ZDY4ODhkMWViY2FiYzU5OTcxM2IzYWYyODNkZDI1M2Q3NWNmNTgxYWQi\
     LCJ0YWciOiIifQ%3D%3D",
)];

static CATALOG_MAIN_LINK: Lazy<Selector> = Lazy::new(|| selector("a.header-catalog-main"));
static SECTION_LINK: Lazy<Selector> = Lazy::new(|| selector("a.catalog-categories-item"));
static SECTION_TITLE: Lazy<Selector> = Lazy::new(|| selector("h3"));
static GOODS_CARD: Lazy<Selector> = Lazy::new(|| selector("div.goods-item-content"));
static CARD_LINK: Lazy<Selector> = Lazy::new(|| selector("a"));
static PAGE_ANCHOR: Lazy<Selector> = Lazy::new(|| selector("div.product-page-inner"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("div.product-page-title"));
static PRICE: Lazy<Selector> = Lazy::new(|| selector("div.goods-item-current-price"));
static BREADCRUMB_LINK: Lazy<Selector> = Lazy::new(|| selector("ul.breadcrumbs a"));
static PRODUCT_ID_LINE: Lazy<Selector> = Lazy::new(|| selector("div.product-page-id"));
static CHARACTERISTIC_ITEM: Lazy<Selector> =
    Lazy::new(|| selector("div.product-page-characteristics li"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| selector("p"));

pub fn adapter() -> SiteAdapter {
    SiteAdapter {
        name: NAME,
        base_url: BASE_URL,
        currency: "MDL",
        headers: HEADERS,
        cookies: COOKIES,
        resolver: Arc::new(PanlightResolver),
        lister: Arc::new(PanlightLister {
            page_cap: DEFAULT_SENTINEL_PAGE_CAP,
        }),
        extractor: Arc::new(PanlightExtractor),
    }
}

/// The home page links top-level sections; a section page links its
/// subsections exactly one level deep. Pages with neither are listing leaves.
pub struct PanlightResolver;

#[async_trait]
impl CategoryResolver for PanlightResolver {
    async fn resolve(&self, fetch: &dyn PageFetcher, seed_url: &str) -> Result<CategoryNode> {
        let body = fetch
            .get_page(CrawlStage::ResolvingCategories, seed_url)
            .await?;
        let html = Html::parse_document(&body);

        let top: Vec<CategoryNode> = html
            .select(&CATALOG_MAIN_LINK)
            .filter_map(|link| {
                let href = link.value().attr("href")?.trim().to_string();
                let name = element_text(&link);
                (!name.is_empty() && !href.is_empty())
                    .then(|| CategoryNode::new(name, href))
            })
            .collect();
        if !top.is_empty() {
            return Ok(CategoryNode::with_children(NAME, seed_url, top));
        }

        let sections: Vec<CategoryNode> = html
            .select(&SECTION_LINK)
            .filter_map(|link| {
                let href = link.value().attr("href")?.trim().to_string();
                let name = link
                    .select(&SECTION_TITLE)
                    .next()
                    .map(|title| element_text(&title))?;
                (!name.is_empty() && !href.is_empty())
                    .then(|| CategoryNode::new(name, href))
            })
            .collect();
        Ok(CategoryNode::with_children(seed_url, seed_url, sections))
    }
}

/// Sentinel pagination: no total is published, so pages are walked until
/// one renders no product cards, bounded by `page_cap`.
pub struct PanlightLister {
    pub page_cap: u32,
}

fn product_links(body: &str) -> Vec<String> {
    let html = Html::parse_document(body);
    html.select(&GOODS_CARD)
        .filter_map(|card| card.select(&CARD_LINK).next())
        .filter_map(|link| link.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect()
}

#[async_trait]
impl ProductLister for PanlightLister {
    async fn list(&self, fetch: &dyn PageFetcher, category_url: &str) -> Result<Vec<String>> {
        paginate_sentinel(
            fetch,
            self.page_cap,
            |page| format!("{category_url}?page={page}"),
            product_links,
        )
        .await
    }
}

/// Field extraction anchored on `div.product-page-inner`. The id block
/// carries "key: value" lines where "Код товара" is the article code;
/// characteristic list items with a label and a value paragraph become extra
/// fields, repeated labels folding into lists.
pub struct PanlightExtractor;

impl ProductExtractor for PanlightExtractor {
    fn extract(&self, body: &str) -> Option<ProductRecord> {
        let html = Html::parse_document(body);
        html.select(&PAGE_ANCHOR).next()?;

        let mut record = ProductRecord::new();
        if let Some(title) = html.select(&TITLE).next() {
            record.insert(FIELD_TITLE, element_text(&title));
        }
        if let Some(price) = html
            .select(&PRICE)
            .next()
            .and_then(|el| normalize_price(&element_text(&el)))
        {
            record.insert(FIELD_PRICE, price);
        }
        if let Some(crumb) = html.select(&BREADCRUMB_LINK).last() {
            record.insert(FIELD_CATEGORY, element_text(&crumb));
        }
        for line in html.select(&PRODUCT_ID_LINE) {
            let text = element_text(&line);
            if let Some((key, value)) = text.split_once(": ") {
                let key = if key == "Код товара" { FIELD_SKU } else { key };
                record.insert(key, value.trim());
            }
        }
        for item in html.select(&CHARACTERISTIC_ITEM) {
            let paragraphs: Vec<_> = item.select(&PARAGRAPH).collect();
            if paragraphs.len() == 2 {
                record.insert(element_text(&paragraphs[0]), element_text(&paragraphs[1]));
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
        <ul class="breadcrumbs">
          <li><a href="/ru">Главная</a></li>
          <li><a href="/ru/iluminat">Освещение</a></li>
        </ul>
        <div class="product-page-inner">
          <div class="product-page-title">Светодиодная панель 40Вт 60*60</div>
          <div class="goods-item-current-price">278.00 MDL / шт.</div>
          <div class="product-page-id">Код товара: PL-7700</div>
          <div class="product-page-id">Бренд: Panlight</div>
          <div class="product-page-characteristics">
            <ul>
              <li><p>Мощность</p><p>40 W</p></li>
              <li><p>Сечение</p><p>1.5</p></li>
              <li><p>Сечение</p><p>2.5</p></li>
              <li><p>без значения</p></li>
            </ul>
          </div>
        </div>"#;

    #[test]
    fn extracts_ids_and_characteristics() {
        let record = PanlightExtractor.extract(PRODUCT_PAGE).unwrap();
        assert_eq!(record.title(), Some("LED панель 40W 60x60"));
        assert_eq!(record.price(), Some("278,00"));
        assert_eq!(
            record.get(FIELD_SKU),
            Some(&FieldValue::Single("PL-7700".into()))
        );
        assert_eq!(
            record.get(FIELD_CATEGORY),
            Some(&FieldValue::Single("Освещение".into()))
        );
        assert_eq!(
            record.get("Бренд"),
            Some(&FieldValue::Single("Panlight".into()))
        );
        // Repeated characteristic labels accumulate instead of overwriting.
        assert_eq!(
            record.get("Сечение"),
            Some(&FieldValue::Many(vec!["1.5".into(), "2.5".into()]))
        );
        assert!(record.get("без значения").is_none());
    }

    #[test]
    fn page_without_anchor_is_a_mismatch() {
        assert!(PanlightExtractor
            .extract("<div class='goods-list'></div>")
            .is_none());
    }

    #[test]
    fn listing_cards_yield_their_first_link() {
        let body = r#"
            <div class="goods-item-content">
              <a href="https://www.panlight.md/ru/p/1">x</a>
              <a href="https://www.panlight.md/ru/p/1#reviews">y</a>
            </div>
            <div class="goods-item-content"><a href="https://www.panlight.md/ru/p/2">z</a></div>"#;
        assert_eq!(
            product_links(body),
            vec![
                "https://www.panlight.md/ru/p/1".to_string(),
                "https://www.panlight.md/ru/p/2".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn section_page_resolves_one_level() {
        struct One;
        #[async_trait]
        impl PageFetcher for One {
            async fn get_page(&self, _stage: CrawlStage, _url: &str) -> Result<String> {
                Ok(r#"
                    <a class="catalog-categories-item" href="https://www.panlight.md/ru/c/1"><h3>Панели</h3></a>
                    <a class="catalog-categories-item" href="https://www.panlight.md/ru/c/2"><h3>Ленты</h3></a>"#
                    .to_string())
            }
        }
        let tree = PanlightResolver
            .resolve(&One, "https://www.panlight.md/ru/iluminat")
            .await
            .unwrap();
        assert_eq!(tree.children.len(), 2);
        assert!(tree.children.iter().all(CategoryNode::is_leaf));
    }
}
