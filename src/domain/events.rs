//! Crawl run lifecycle stages.

use serde::Serialize;

/// Pipeline stage of a per-site crawl run.
///
/// Transitions are strictly sequential within a run:
/// `Idle → ResolvingCategories → ListingProducts → ExtractingProducts → Done`.
/// `Failed` absorbs a run that could not finish a stage, but it is never a
/// dead end — whatever partial result was gathered is still handed onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CrawlStage {
    Idle,
    ResolvingCategories,
    ListingProducts,
    ExtractingProducts,
    Done,
    Failed,
}

impl CrawlStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ResolvingCategories => "resolving_categories",
            Self::ListingProducts => "listing_products",
            Self::ExtractingProducts => "extracting_products",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CrawlStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
