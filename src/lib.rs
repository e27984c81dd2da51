pub mod cache_probe;
pub mod collector;
pub mod config;
pub mod error;
pub mod extractor;
pub mod format;
pub mod history;
pub mod parallelism;
pub mod record;
pub mod runner;
pub mod summary;
pub use crate::collector::{CollectOutcome, Collector};
pub use crate::config::Config;
pub use crate::error::{Result, StopwatchError};
pub use crate::history::{HistoryStore, JsonFileHistory, MemoryHistory};
pub use crate::record::BuildRun;
pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
