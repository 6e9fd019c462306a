//! One sequential pass over the configured sites.
//!
//! Every per-site failure, including a failed snapshot write, is logged and
//! degrades to that site alone; the pass always moves on to the next site.
//! Only cancellation ends a pass early.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::orchestrator::CrawlOrchestrator;
use crate::application::sink::SheetSink;
use crate::domain::services::{PageFetcher, SiteAdapter};
use crate::infrastructure::config::{AppConfig, SiteSettings};

/// Pause between sites so a pass does not hammer the next host the moment
/// the previous one finishes.
const BETWEEN_SITES: Duration = Duration::from_secs(2);

/// Crawl every enabled site in order and hand each non-empty result to the
/// sink. `make_fetcher` builds the gated fetcher for one site from its
/// settings.
pub async fn run_pass<F>(
    sites: Vec<(&'static str, SiteAdapter)>,
    config: &AppConfig,
    sink: &dyn SheetSink,
    cancel: &CancellationToken,
    make_fetcher: F,
) where
    F: Fn(&SiteAdapter, &SiteSettings) -> Result<Arc<dyn PageFetcher>>,
{
    for (name, site) in sites {
        if cancel.is_cancelled() {
            break;
        }
        let settings = config.site(name);
        if !settings.enabled {
            info!(site = name, "disabled, skipped");
            continue;
        }

        let fetcher = match make_fetcher(&site, &settings) {
            Ok(fetcher) => fetcher,
            Err(error) => {
                error!(site = name, %error, "fetcher setup failed");
                continue;
            }
        };
        let currency = site.currency;
        let orchestrator = CrawlOrchestrator::new(site, fetcher, cancel.clone());

        match orchestrator.run(&settings.categories).await {
            Ok(report) if report.result.is_empty() => {
                warn!(site = name, stage = %report.stage, "run produced no records");
            }
            Ok(report) => {
                if let Err(error) = sink.write(name, &report.result, currency).await {
                    error!(site = name, %error, "snapshot write failed");
                }
            }
            Err(error) => {
                error!(site = name, %error, "run aborted");
            }
        }

        tokio::time::sleep(BETWEEN_SITES).await;
    }
}
