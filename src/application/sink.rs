//! Crawl result sink: one JSON snapshot per site with per-product price
//! history.
//!
//! Every run is merged into the site's snapshot file. A product keeps its
//! accumulated history; a new dated entry is appended only when the price
//! actually moved since the last recorded one, so a stable price costs one
//! history row no matter how many runs observe it. Products missing from a
//! run (page down, shape change) stay in the snapshot untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::product::{CrawlResult, ProductRecord};

/// Receives the result of one per-site crawl run.
#[async_trait]
pub trait SheetSink: Send + Sync {
    async fn write(&self, site: &str, result: &CrawlResult, currency: &str) -> Result<()>;
}

/// One product's row in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductEntry {
    pub fields: ProductRecord,
    /// Date (UTC, `YYYY-MM-DD`) to price, ordered oldest first.
    #[serde(default)]
    pub price_history: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    site: String,
    currency: String,
    updated_at: DateTime<Utc>,
    products: BTreeMap<String, ProductEntry>,
}

/// JSON file sink, one `<site>.json` per site under the output directory.
pub struct SnapshotSink {
    output_dir: PathBuf,
}

impl SnapshotSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn site_path(&self, site: &str) -> PathBuf {
        self.output_dir.join(format!("{site}.json"))
    }

    async fn load_previous(&self, path: &Path) -> Result<Option<Snapshot>> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(None);
        }
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        let snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parsing snapshot {}", path.display()))?;
        Ok(Some(snapshot))
    }

    /// Write atomically: a temp file in the same directory, then rename.
    async fn store(&self, path: &Path, snapshot: &Snapshot) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&tmp, raw)
            .await
            .with_context(|| format!("writing snapshot {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("replacing snapshot {}", path.display()))?;
        Ok(())
    }
}

/// Record `price` under `date` when it differs from the newest history entry.
/// Returns whether the history changed; a same-day reprice overwrites the
/// day's entry in place, so the map length alone cannot tell.
fn record_price(history: &mut BTreeMap<String, String>, date: &str, price: &str) -> bool {
    let unchanged = history
        .values()
        .next_back()
        .is_some_and(|last| last == price);
    if !unchanged {
        history.insert(date.to_string(), price.to_string());
    }
    !unchanged
}

#[async_trait]
impl SheetSink for SnapshotSink {
    async fn write(&self, site: &str, result: &CrawlResult, currency: &str) -> Result<()> {
        let path = self.site_path(site);
        let now = Utc::now();
        let today = now.format("%Y-%m-%d").to_string();

        let mut products = self
            .load_previous(&path)
            .await?
            .map(|previous| previous.products)
            .unwrap_or_default();

        let mut price_changes = 0usize;
        for (url, record) in result {
            let entry = products
                .entry(url.clone())
                .or_insert_with(|| ProductEntry {
                    fields: record.clone(),
                    price_history: BTreeMap::new(),
                });
            entry.fields = record.clone();
            if let Some(price) = record.price() {
                if record_price(&mut entry.price_history, &today, price) {
                    price_changes += 1;
                }
            }
        }

        let snapshot = Snapshot {
            site: site.to_string(),
            currency: currency.to_string(),
            updated_at: now,
            products,
        };
        self.store(&path, &snapshot).await?;
        info!(
            site,
            products = snapshot.products.len(),
            updated = result.len(),
            price_changes,
            path = %path.display(),
            "snapshot written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{FIELD_PRICE, FIELD_TITLE};

    fn record(title: &str, price: &str) -> ProductRecord {
        let mut record = ProductRecord::new();
        record.insert(FIELD_TITLE, title);
        record.insert(FIELD_PRICE, price);
        record
    }

    #[tokio::test]
    async fn first_run_creates_snapshot_with_one_history_entry() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SnapshotSink::new(dir.path());
        let mut result = CrawlResult::new();
        result.insert("https://s/p/1".into(), record("Лампа", "10,00"));

        sink.write("supraten", &result, "MDL").await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("supraten.json")).unwrap();
        let snapshot: Snapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(snapshot.site, "supraten");
        assert_eq!(snapshot.currency, "MDL");
        let entry = &snapshot.products["https://s/p/1"];
        assert_eq!(entry.price_history.len(), 1);
        assert_eq!(entry.price_history.values().next().unwrap(), "10,00");
    }

    #[tokio::test]
    async fn unchanged_price_adds_no_history_row() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SnapshotSink::new(dir.path());
        let mut result = CrawlResult::new();
        result.insert("https://s/p/1".into(), record("Лампа", "10,00"));

        sink.write("supraten", &result, "MDL").await.unwrap();
        sink.write("supraten", &result, "MDL").await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("supraten.json")).unwrap();
        let snapshot: Snapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(snapshot.products["https://s/p/1"].price_history.len(), 1);
    }

    #[tokio::test]
    async fn missing_product_survives_with_its_history() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SnapshotSink::new(dir.path());

        let mut first = CrawlResult::new();
        first.insert("https://s/p/1".into(), record("Лампа", "10,00"));
        first.insert("https://s/p/2".into(), record("Кабель", "5,50"));
        sink.write("supraten", &first, "MDL").await.unwrap();

        // Second run lost p/2 but repriced p/1.
        let mut second = CrawlResult::new();
        second.insert("https://s/p/1".into(), record("Лампа", "12,00"));
        sink.write("supraten", &second, "MDL").await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("supraten.json")).unwrap();
        let snapshot: Snapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(snapshot.products.len(), 2);
        assert_eq!(snapshot.products["https://s/p/2"].price_history.len(), 1);
        // Same-day reprice overwrites the day's entry rather than duplicating.
        let history = &snapshot.products["https://s/p/1"].price_history;
        assert_eq!(history.values().last().unwrap(), "12,00");
    }

    #[test]
    fn history_appends_only_on_change() {
        let mut history = BTreeMap::new();
        assert!(record_price(&mut history, "2026-08-20", "10,00"));
        assert!(!record_price(&mut history, "2026-08-21", "10,00"));
        assert!(record_price(&mut history, "2026-08-22", "11,50"));
        assert_eq!(history.len(), 2);
        assert_eq!(history["2026-08-22"], "11,50");
    }

    #[test]
    fn same_day_reprice_counts_as_a_change() {
        let mut history = BTreeMap::new();
        assert!(record_price(&mut history, "2026-08-22", "10,00"));
        // Overwrites the day's entry in place; length stays 1 but the
        // history still changed.
        assert!(record_price(&mut history, "2026-08-22", "12,00"));
        assert_eq!(history.len(), 1);
        assert_eq!(history["2026-08-22"], "12,00");
    }
}
