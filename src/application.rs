//! Application layer: crawl orchestration and result sinks.

pub mod orchestrator;
pub mod runner;
pub mod sink;

pub use orchestrator::CrawlOrchestrator;
pub use runner::run_pass;
pub use sink::{SheetSink, SnapshotSink};
