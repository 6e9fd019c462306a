//! Core catalog types: category trees, extracted product records, crawl results.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::events::CrawlStage;

/// Canonical record keys shared by every site extractor.
///
/// The downstream sheet expects these exact labels, so extractors map their
/// site-specific markup onto them instead of inventing per-site names.
pub const FIELD_TITLE: &str = "Название";
pub const FIELD_PRICE: &str = "price";
pub const FIELD_CATEGORY: &str = "Категория";
pub const FIELD_SKU: &str = "Артикул";

/// A single extracted field: most fields carry one value, but repeated
/// characteristic labels (the same characteristics row appearing twice on a
/// page) accumulate into a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Many(Vec<String>),
}

impl FieldValue {
    fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                *self = Self::Many(vec![std::mem::take(existing), value]);
            }
            Self::Many(values) => values.push(value),
        }
    }

    /// The single value, or the first of a repeated list.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value.as_str()),
            Self::Many(values) => values.first().map(String::as_str),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

/// Flat field mapping extracted from one product page.
///
/// Keys are stored sorted so snapshots diff cleanly between runs. Immutable
/// once handed to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(flatten)]
    fields: BTreeMap<String, FieldValue>,
}

impl ProductRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field; a duplicate key folds the new value into a list
    /// instead of overwriting, matching how repeated characteristic rows
    /// behave on the source pages.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let key = key.into();
        match (self.fields.get_mut(&key), value.into()) {
            (Some(existing), FieldValue::Single(v)) => existing.push(v),
            (Some(existing), FieldValue::Many(vs)) => {
                for v in vs {
                    existing.push(v);
                }
            }
            (None, value) => {
                self.fields.insert(key, value);
            }
        }
    }

    /// Replace a field outright, dropping any accumulated values.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn title(&self) -> Option<&str> {
        self.fields.get(FIELD_TITLE).and_then(FieldValue::first)
    }

    pub fn price(&self) -> Option<&str> {
        self.fields.get(FIELD_PRICE).and_then(FieldValue::first)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}

/// One node of a site's category tree. Leaves are listing pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub name: String,
    pub url: String,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(
        name: impl Into<String>,
        url: impl Into<String>,
        children: Vec<CategoryNode>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// All listing pages under this node, depth-first. A leaf returns itself,
    /// so resolving a category that is already a listing page still yields
    /// one page to crawl.
    pub fn leaves(&self) -> Vec<&CategoryNode> {
        if self.is_leaf() {
            return vec![self];
        }
        let mut out = Vec::new();
        let mut stack: Vec<&CategoryNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if node.is_leaf() {
                out.push(node);
            } else {
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// Total node count including this one.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(CategoryNode::size).sum::<usize>()
    }
}

/// Final mapping of one crawl run, keyed by canonical product URL.
/// A URL absent from the map was skipped (fetch exhausted or shape mismatch).
pub type CrawlResult = HashMap<String, ProductRecord>;

/// Observability summary of one per-site run. Always produced, even when the
/// run degraded to a partial or empty result.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub site: String,
    /// Terminal stage the run reached.
    pub stage: CrawlStage,
    /// Leaf category listing pages walked.
    pub listing_pages: usize,
    /// Unique product URLs discovered across all categories.
    pub discovered: usize,
    /// Records successfully extracted.
    pub extracted: usize,
    /// URLs whose page did not match the expected product shape.
    pub shape_mismatches: usize,
    /// URLs dropped after retry exhaustion.
    pub fetch_failures: usize,
    pub duration: Duration,
    pub finished_at: DateTime<Utc>,
    #[serde(skip)]
    pub result: CrawlResult,
}
