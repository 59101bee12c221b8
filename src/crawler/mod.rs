//! Crawl orchestration: tasks, shared run state, and the worker pool that
//! drives fetches into the page store.

pub mod orchestrator;
pub mod state;
pub mod task;

pub use orchestrator::{CrawlOrchestrator, CrawlResponse};
pub use state::{normalize, CrawlState};
pub use task::{CrawlReport, CrawlResult, CrawlTask};
