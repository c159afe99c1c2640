//! Source adapter contract and registry
//!
//! Everything about how a given board's markup is shaped lives behind
//! the `SourceAdapter` trait; the orchestration core only consumes
//! `crawl(max_pages, stop_marker)`. Adapters are selected by a registry
//! keyed on source name, not by inheritance chains.

mod board;
mod datetime;

pub use board::BoardAdapter;
pub use datetime::parse_posted_at;

use crate::config::Config;
use crate::deal::Deal;
use crate::fetch::FetchProfile;
use async_trait::async_trait;
use std::collections::HashMap;

/// Result of one adapter crawl call
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    /// Deals in the order encountered (newest-first for these boards),
    /// deduplicated by URL within the call
    pub deals: Vec<Deal>,

    /// True when the stop marker was encountered; the matching record
    /// itself is excluded
    pub stopped_early: bool,
}

/// One crawlable deal-board source
///
/// Contract obligations the core relies on:
/// - Records come back in the order encountered, consistent within a call.
/// - A record whose URL equals `stop_marker` ends emission for the whole
///   call and sets `stopped_early`; the record itself is excluded.
/// - A page with zero parsable listings is not an error; the adapter
///   returns what it found so the orchestrator can log a
///   structural-change warning.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Registry key for this source
    fn name(&self) -> &str;

    /// Stable identifier used in the store
    fn source_id(&self) -> i64;

    /// Crawls up to `max_pages` list pages, stopping at the marker
    async fn crawl(&self, max_pages: u32, stop_marker: Option<&str>) -> crate::Result<CrawlOutcome>;
}

/// Builds the adapter registry from configuration
///
/// One adapter per configured source, each owning its own HTTP client
/// for the duration of the run.
pub fn build_adapters(
    config: &Config,
    profile: &FetchProfile,
) -> crate::Result<HashMap<String, Box<dyn SourceAdapter>>> {
    let mut adapters: HashMap<String, Box<dyn SourceAdapter>> = HashMap::new();

    for (index, entry) in config.sources.iter().enumerate() {
        let adapter = BoardAdapter::from_entry(
            entry,
            profile.clone(),
            config.output.snapshot_dir.clone().into(),
            index,
        )?;
        adapters.insert(entry.name.clone(), Box::new(adapter));
    }

    tracing::info!("Registered {} source adapters", adapters.len());
    Ok(adapters)
}
