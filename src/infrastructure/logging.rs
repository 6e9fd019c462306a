//! Logging initialization: console output always, optional non-blocking
//! file output under the configured directory.
//!
//! `RUST_LOG` overrides the configured level, e.g.
//! `RUST_LOG="debug,reqwest=debug"` to see HTTP client internals.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tracing::info;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking writer alive for the process lifetime.
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(level);
        if !level.eq_ignore_ascii_case("trace") {
            // Keep dependency chatter down unless TRACE is explicitly asked for.
            for directive in ["reqwest=info", "hyper=warn", "h2=warn", "tokio=info"] {
                filter = filter.add_directive(directive.parse().expect("directive is valid"));
            }
        }
        filter
    })
}

/// Install the global subscriber. Call once, before any crawl starts.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let registry = Registry::default().with(env_filter(&config.level));

    if config.file_enabled {
        let log_dir = Path::new(&config.dir);
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("creating log directory {}", log_dir.display()))?;

        let (file_writer, guard) = non_blocking(rolling::daily(log_dir, "pricewatch.log"));
        LOG_GUARDS.lock().expect("log guard mutex poisoned").push(guard);

        let file_layer = fmt::Layer::new()
            .with_writer(file_writer)
            .with_target(false)
            .with_ansi(false);
        let console_layer = fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_target(false);
        registry.with(file_layer).with(console_layer).init();
    } else {
        let console_layer = fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_target(false);
        registry.with(console_layer).init();
    }

    info!(level = %config.level, file = config.file_enabled, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_builds_for_every_supported_level() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            // Panics inside env_filter would surface here.
            let _ = env_filter(level);
        }
    }
}
