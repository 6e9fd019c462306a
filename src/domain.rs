//! Domain layer: catalog types, crawl lifecycle, and the service traits
//! every site adapter implements.

pub mod events;
pub mod product;
pub mod services;

pub use events::CrawlStage;
pub use product::{
    CategoryNode, CrawlReport, CrawlResult, FIELD_CATEGORY, FIELD_PRICE, FIELD_SKU, FIELD_TITLE,
    FieldValue, ProductRecord,
};
pub use services::{CategoryResolver, PageFetcher, ProductExtractor, ProductLister, SiteAdapter};
