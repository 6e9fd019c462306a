//! habsev.md: fixed top-level catalog, recursive subcatalog pages, counted
//! pagination read off the pagination widget, product pages under
//! `#product__page`. The storefront needs its locale cookies or it answers
//! in the wrong language.

use std::collections::HashSet;
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
use crate::infrastructure::pagination::paginate_counted;
use crate::infrastructure::sites::{element_text, resolve_subtree, selector};

const NAME: &str = "habsev";
const BASE_URL: &str = "https://habsev.md";

const HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    ),
    ("accept-language", "ru-RU,ru;q=0.7"),
];

const COOKIES: &[(&str, &str)] = &[
    ("firstVisit", "true"),
    ("i18n_redirected", "ru"),
    ("language", "ru"),
    ("user-theme", "light-theme"),
    ("first_lang_visit", "true"),
    ("getPreviousLocale", "ru"),
];

/// The storefront home page renders its catalog via scripts, so the
/// top-level categories are pinned here instead of scraped.
const TOP_CATEGORIES: &[(&str, &str)] = &[
    (
        "Электрические кабели и провода",
        "https://habsev.md/ru/cabluri-electrice-si-conductoare",
    ),
    (
        "Кабельные системы позиционирования и аксессуары",
        "https://habsev.md/ru/accesorii-cablu",
    ),
    (
        "Коробки распределительные, электрощитки и аксессуары",
        "https://habsev.md/ru/doze-si-tablouri-electrice",
    ),
    (
        "Защита электрических цепей",
        "https://habsev.md/ru/protectie-si-comutare",
    ),
    (
        "Розетки и выключатели",
        "https://habsev.md/ru/prize-si-intrerupatoare-1",
    ),
    (
        "Контрольно-измерительное оборудование",
        "https://habsev.md/ru/scule-si-aparate-de-masura",
    ),
    ("Освещение", "https://habsev.md/ru/iluminat"),
    (
        "Электрическое отопление",
        "https://habsev.md/ru/incalzire-electrica",
    ),
    (
        "Средства индивидуальной защиты",
        "https://habsev.md/ru/echipament-de-protectie",
    ),
    (
        "Заземление / Громоотвод",
        "https://habsev.md/ru/impamantare-paratrasnet",
    ),
    ("Зарядные станции", "https://habsev.md/ru/statie-de-incarcare"),
    (
        "Оборудование для бесперебойного питания",
        "https://habsev.md/ru/echipament-electric-de-protectie",
    ),
    (
        "Уличное освещение",
        "https://habsev.md/ru/iluminat-stradal-lea",
    ),
    (
        "Концевые и соединительные муфты до 1 кВ",
        "https://habsev.md/ru/recloser",
    ),
    (
        "Оборудование 6-35 кВ",
        "https://habsev.md/ru/posturi-si-transformatoare",
    ),
    (
        "Фотоэлектрические системы",
        "https://habsev.md/ru/sisteme-fotovoltaice",
    ),
];

static SUBCATALOG_LINK: Lazy<Selector> = Lazy::new(|| selector("a.subcatalog__item"));
static SUBCATALOG_TITLE: Lazy<Selector> = Lazy::new(|| selector("div.title"));
static PAGINATION_ITEM: Lazy<Selector> = Lazy::new(|| selector("li.pagination__item"));
static PRODUCT_ITEM_LINK: Lazy<Selector> = Lazy::new(|| selector("div.product__item a"));
static PAGE_ANCHOR: Lazy<Selector> = Lazy::new(|| selector("#product__page"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("h1.product__title"));
static CODE: Lazy<Selector> = Lazy::new(|| selector("div.product__code"));
static PRICES: Lazy<Selector> = Lazy::new(|| selector("div.product__prices"));
static BREADCRUMB_ITEM: Lazy<Selector> =
    Lazy::new(|| selector("ol.breadcrumb__items li.breadcrumb__item"));
static DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| selector("div.description__section div.content"));

pub fn adapter() -> SiteAdapter {
    SiteAdapter {
        name: NAME,
        base_url: BASE_URL,
        currency: "MDL",
        headers: HEADERS,
        cookies: COOKIES,
        resolver: Arc::new(HabsevResolver),
        lister: Arc::new(HabsevLister),
        extractor: Arc::new(HabsevExtractor),
    }
}

fn subcategory_links(body: &str) -> Vec<(String, String)> {
    let html = Html::parse_document(body);
    html.select(&SUBCATALOG_LINK)
        .filter_map(|link| {
            let href = link.value().attr("href")?.trim().to_string();
            let name = link
                .select(&SUBCATALOG_TITLE)
                .next()
                .map(|title| element_text(&title))?;
            (!name.is_empty() && !href.is_empty()).then_some((name, href))
        })
        .collect()
}

/// Resolving the base URL yields the pinned top-level map; resolving a
/// category URL recurses through subcatalog pages.
pub struct HabsevResolver;

#[async_trait]
impl CategoryResolver for HabsevResolver {
    async fn resolve(&self, fetch: &dyn PageFetcher, seed_url: &str) -> Result<CategoryNode> {
        if seed_url.trim_end_matches('/') == BASE_URL {
            let children = TOP_CATEGORIES
                .iter()
                .map(|(name, url)| CategoryNode::new(*name, *url))
                .collect();
            return Ok(CategoryNode::with_children(NAME, seed_url, children));
        }
        let body = fetch
            .get_page(CrawlStage::ResolvingCategories, seed_url)
            .await?;
        let mut visited = HashSet::from([seed_url.to_string()]);
        let children = resolve_subtree(fetch, body, &mut visited, &subcategory_links).await;
        Ok(CategoryNode::with_children(seed_url, seed_url, children))
    }
}

/// Counted pagination: the widget on the first page names the last page,
/// product links are relative and get the host prefixed.
pub struct HabsevLister;

fn product_links(body: &str) -> Vec<String> {
    let html = Html::parse_document(body);
    html.select(&PRODUCT_ITEM_LINK)
        .filter_map(|link| link.value().attr("href"))
        .map(|href| format!("{BASE_URL}{}", href.trim()))
        .collect()
}

fn last_page_number(body: &str) -> u32 {
    let html = Html::parse_document(body);
    html.select(&PAGINATION_ITEM)
        .filter_map(|item| element_text(&item).parse::<u32>().ok())
        .max()
        .unwrap_or(1)
}

#[async_trait]
impl ProductLister for HabsevLister {
    async fn list(&self, fetch: &dyn PageFetcher, category_url: &str) -> Result<Vec<String>> {
        let first = fetch
            .get_page(CrawlStage::ListingProducts, category_url)
            .await?;
        let total_pages = last_page_number(&first);
        paginate_counted(
            fetch,
            total_pages,
            |page| format!("{category_url}?page={page}"),
            product_links,
        )
        .await
    }
}

/// Field extraction anchored on `#product__page`; the description block
/// becomes a plain text field.
pub struct HabsevExtractor;

impl ProductExtractor for HabsevExtractor {
    fn extract(&self, body: &str) -> Option<ProductRecord> {
        let html = Html::parse_document(body);
        let page = html.select(&PAGE_ANCHOR).next()?;

        let mut record = ProductRecord::new();
        if let Some(title) = page.select(&TITLE).next() {
            record.insert(FIELD_TITLE, element_text(&title));
        }
        if let Some(code) = page.select(&CODE).next() {
            let text = element_text(&code);
            if let Some(value) = text.rsplit(':').next() {
                record.insert(FIELD_SKU, value.trim());
            }
        }
        if let Some(price) = page
            .select(&PRICES)
            .next()
            .and_then(|el| normalize_price(&element_text(&el)))
        {
            record.insert(FIELD_PRICE, price);
        }
        let crumbs: Vec<_> = html.select(&BREADCRUMB_ITEM).collect();
        if crumbs.len() >= 2 {
            record.insert(FIELD_CATEGORY, element_text(&crumbs[crumbs.len() - 2]));
        }
        if let Some(description) = html.select(&DESCRIPTION).next() {
            record.insert("Описание", element_text(&description));
        }
        normalize_record_title(&mut record);
        Some(record)
    }
}
