use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use pricewatch::application::{run_pass, SnapshotSink};
use pricewatch::domain::PageFetcher;
use pricewatch::infrastructure::{
    config::AppConfig, logging::init_logging, sites, HttpClient, SiteClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let config = AppConfig::load_or_create(&config_path)
        .await
        .with_context(|| format!("loading config {}", config_path.display()))?;
    init_logging(&config.logging)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested, finishing in-flight work");
                cancel.cancel();
            }
        });
    }

    loop {
        run_all_sites(&config, &cancel).await?;
        if cancel.is_cancelled() {
            break;
        }
        let Some(repeat_secs) = config.sink.repeat_secs else {
            break;
        };
        info!(repeat_secs, "run complete, sleeping until next pass");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(repeat_secs)) => {}
        }
    }
    info!("exiting");
    Ok(())
}

/// One full pass: every enabled site, sequentially, each with its own
/// gated fetcher sharing one rate-limited HTTP client.
async fn run_all_sites(config: &AppConfig, cancel: &CancellationToken) -> Result<()> {
    let http = Arc::new(HttpClient::new(&config.crawler.http_client_config())?);
    let sink = SnapshotSink::new(&config.sink.output_dir);

    run_pass(
        sites::registry().into_iter().collect(),
        config,
        &sink,
        cancel,
        |site, settings| {
            let client = SiteClient::new(
                Arc::clone(&http),
                config.crawler.retry_policy(settings),
                config.crawler.stage_gates(settings),
                site,
            )?;
            Ok(Arc::new(client) as Arc<dyn PageFetcher>)
        },
    )
    .await;
    Ok(())
}
