//! Harvest orchestrator - main run sequencing logic
//!
//! This module sequences one harvest run across all registered sources:
//! - Resolving stop markers once, up front, in a single aggregate query
//! - Driving each source through fetch, filter, save, and trim
//! - Isolating failures so one broken source never aborts the run
//! - Aggregating `(total_crawled, total_saved)` across sources
//!
//! Sources are processed sequentially; they share no mutable state
//! except the store, so nothing here precludes running them from a
//! worker pool instead.

mod stage;

pub use stage::SourceStage;

use crate::adapter::{build_adapters, SourceAdapter};
use crate::config::{Config, SourceEntry};
use crate::dedup::{filter_duplicates, LookbackWindow};
use crate::fetch::FetchProfile;
use crate::retention;
use crate::store::{DealStore, InsertOutcome};
use crate::SweepError;
use chrono::Utc;
use std::collections::HashMap;

/// Outcome of one source within a run
#[derive(Debug)]
pub struct SourceReport {
    pub name: String,

    /// Deals returned by the adapter
    pub crawled: usize,

    /// Deals actually persisted
    pub saved: usize,

    /// Dropped by the duplicate filter before saving
    pub duplicates: usize,

    /// Insert conflicts on the store's uniqueness constraint
    pub conflicts: usize,

    /// Rows removed by retention trimming
    pub trimmed: u64,

    /// Whether the adapter hit the stop marker
    pub stopped_early: bool,

    /// Present when the source failed; names the stage it failed in
    pub failed: Option<String>,
}

impl SourceReport {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            crawled: 0,
            saved: 0,
            duplicates: 0,
            conflicts: 0,
            trimmed: 0,
            stopped_early: false,
            failed: None,
        }
    }
}

/// Aggregate outcome of one harvest run
#[derive(Debug)]
pub struct RunReport {
    pub total_crawled: usize,
    pub total_saved: usize,
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    /// Number of sources that failed outright
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.failed.is_some()).count()
    }
}

/// Sequences one harvest run across the registered sources
pub struct Harvester {
    config: Config,
    adapters: HashMap<String, Box<dyn SourceAdapter>>,
}

impl Harvester {
    /// Builds a harvester with board adapters for every configured source
    pub fn new(config: Config) -> crate::Result<Self> {
        let profile = FetchProfile::from_config(&config.fetch);
        let adapters = build_adapters(&config, &profile)?;
        Ok(Self { config, adapters })
    }

    /// Builds a harvester around pre-built adapters (test doubles)
    pub fn with_adapters(
        config: Config,
        adapters: HashMap<String, Box<dyn SourceAdapter>>,
    ) -> Self {
        Self { config, adapters }
    }

    /// Runs all configured sources, or just `only` when given
    ///
    /// A single source's total failure is converted to a skip; the run
    /// always terminates and reports aggregate counts. Only the caller's
    /// store-open failure, before this method is reached, is fatal.
    pub async fn run(
        &self,
        store: &mut dyn DealStore,
        only: Option<&str>,
    ) -> crate::Result<RunReport> {
        let sources: Vec<&SourceEntry> = match only {
            Some(name) => {
                let entry = self
                    .config
                    .sources
                    .iter()
                    .find(|s| s.name == name)
                    .ok_or_else(|| SweepError::UnknownSource(name.to_string()))?;
                vec![entry]
            }
            None => self.config.sources.iter().collect(),
        };

        // Stop markers are resolved once for all sources, before any
        // source starts, and are read-only thereafter. A failed lookup
        // degrades to unconditional crawls, never aborts.
        let stop_markers = match store.latest_url_per_source() {
            Ok(markers) => markers,
            Err(e) => {
                tracing::warn!("Stop-marker lookup failed, crawling unconditionally: {}", e);
                HashMap::new()
            }
        };

        let mut report = RunReport {
            total_crawled: 0,
            total_saved: 0,
            sources: Vec::with_capacity(sources.len()),
        };

        for entry in sources {
            let adapter = match self.adapters.get(&entry.name) {
                Some(adapter) => adapter.as_ref(),
                None => {
                    tracing::warn!("{}: no adapter registered, skipping", entry.name);
                    continue;
                }
            };

            let marker = stop_markers.get(&entry.source_id).map(String::as_str);

            let source_report = match self.run_source(entry, adapter, store, marker).await {
                Ok(source_report) => source_report,
                Err((stage, e)) => {
                    tracing::error!(
                        "{}: failed during {}: {} - continuing with next source",
                        entry.name,
                        stage.as_str(),
                        e
                    );
                    let mut failed = SourceReport::empty(&entry.name);
                    failed.failed = Some(format!("{}: {}", stage.as_str(), e));
                    failed
                }
            };

            report.total_crawled += source_report.crawled;
            report.total_saved += source_report.saved;
            report.sources.push(source_report);
        }

        tracing::info!(
            "Harvest complete: {} crawled / {} saved across {} sources ({} failed)",
            report.total_crawled,
            report.total_saved,
            report.sources.len(),
            report.failed_sources()
        );

        Ok(report)
    }

    /// Drives one source through its stages
    ///
    /// Fetching errors fail the source; store hiccups inside filtering,
    /// saving, and trimming degrade to skips of the affected operation.
    async fn run_source(
        &self,
        entry: &SourceEntry,
        adapter: &dyn SourceAdapter,
        store: &mut dyn DealStore,
        stop_marker: Option<&str>,
    ) -> std::result::Result<SourceReport, (SourceStage, SweepError)> {
        let mut stage = SourceStage::Pending;
        let mut report = SourceReport::empty(&entry.name);

        stage = stage.advance(&entry.name, SourceStage::Fetching);
        let outcome = adapter
            .crawl(entry.max_pages, stop_marker)
            .await
            .map_err(|e| (stage, e))?;

        report.crawled = outcome.deals.len();
        report.stopped_early = outcome.stopped_early;

        if outcome.deals.is_empty() {
            tracing::info!("{}: nothing new collected", entry.name);
            stage.advance(&entry.name, SourceStage::Done);
            return Ok(report);
        }

        stage = stage.advance(&entry.name, SourceStage::Filtering);
        let kept = if self.config.dedup.enabled {
            let since = (Utc::now() - chrono::Duration::days(self.config.dedup.lookback_days))
                .to_rfc3339();

            // A failed window read skips duplicate detection rather
            // than failing the source; the unique index still guards
            // against exact re-saves
            let mut window = match store.recent_deals(&since) {
                Ok(rows) => LookbackWindow::from_rows(rows),
                Err(e) => {
                    tracing::warn!(
                        "{}: lookback query failed, skipping duplicate check: {}",
                        entry.name,
                        e
                    );
                    LookbackWindow::empty()
                }
            };

            let filtered = filter_duplicates(
                outcome.deals,
                &mut window,
                self.config.dedup.similarity_threshold,
            );
            report.duplicates = filtered.dropped_exact + filtered.dropped_similar;
            if report.duplicates > 0 {
                tracing::info!(
                    "{}: {} duplicates filtered ({} exact, {} similar)",
                    entry.name,
                    report.duplicates,
                    filtered.dropped_exact,
                    filtered.dropped_similar
                );
            }
            filtered.kept
        } else {
            outcome.deals
        };

        stage = stage.advance(&entry.name, SourceStage::Saving);
        // Adapters emit newest-first; saving oldest-first leaves the
        // newest record as the latest row, which is what the next run's
        // stop-marker lookup reads back
        for deal in kept.iter().rev() {
            match store.insert(deal) {
                Ok(InsertOutcome::Inserted) => report.saved += 1,
                Ok(InsertOutcome::Conflict) => {
                    tracing::debug!("{}: already stored: {}", entry.name, deal.url);
                    report.conflicts += 1;
                }
                Err(e) => {
                    tracing::warn!("{}: insert failed for {}: {}", entry.name, deal.url, e);
                }
            }
        }
        tracing::info!("{}: saved {} of {} deals", entry.name, report.saved, kept.len());

        stage = stage.advance(&entry.name, SourceStage::Trimming);
        if self.config.retention.enabled {
            match retention::enforce(store, entry.source_id, entry.keep_count) {
                Ok(trimmed) => report.trimmed = trimmed,
                Err(e) => {
                    tracing::warn!("{}: trim failed, skipping: {}", entry.name, e);
                }
            }
        }

        stage.advance(&entry.name, SourceStage::Done);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::CrawlOutcome;
    use crate::config::{BoardProfile, DedupConfig, FetchConfig, OutputConfig, RetentionConfig};
    use crate::deal::{Deal, POSTED_AT_FORMAT};
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use chrono::NaiveDateTime;

    /// Scripted in-memory adapter honoring the crawl contract
    struct ScriptedAdapter {
        name: String,
        source_id: i64,
        /// Newest-first, as a board lists them
        deals: Vec<Deal>,
        fail: bool,
        /// Contract-violating mode for conflict tests
        ignore_marker: bool,
    }

    fn scripted(name: &str, source_id: i64, deals: Vec<Deal>) -> ScriptedAdapter {
        ScriptedAdapter {
            name: name.to_string(),
            source_id,
            deals,
            fail: false,
            ignore_marker: false,
        }
    }

    fn failing(name: &str, source_id: i64) -> ScriptedAdapter {
        ScriptedAdapter {
            fail: true,
            ..scripted(name, source_id, vec![])
        }
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn source_id(&self) -> i64 {
            self.source_id
        }

        async fn crawl(
            &self,
            _max_pages: u32,
            stop_marker: Option<&str>,
        ) -> crate::Result<CrawlOutcome> {
            if self.fail {
                return Err(SweepError::Adapter {
                    source_name: self.name.clone(),
                    message: "scripted failure".to_string(),
                });
            }

            let mut outcome = CrawlOutcome::default();
            for deal in &self.deals {
                if !self.ignore_marker && stop_marker == Some(deal.url.as_str()) {
                    outcome.stopped_early = true;
                    break;
                }
                outcome.deals.push(deal.clone());
            }
            Ok(outcome)
        }
    }

    fn deal(source_id: i64, n: u64, title: &str) -> Deal {
        Deal {
            title: title.to_string(),
            url: format!("https://board-{}.example.com/deal/{}", source_id, n),
            image_url: None,
            category: String::new(),
            posted_at: NaiveDateTime::parse_from_str("2025-03-01 10:00:00", POSTED_AT_FORMAT)
                .unwrap(),
            source_id,
        }
    }

    fn board_stub() -> BoardProfile {
        BoardProfile {
            base_url: "https://board.example.com".to_string(),
            list_url: "https://board.example.com/jirum".to_string(),
            page_param: "po".to_string(),
            item_selector: "div.item".to_string(),
            title_selector: "span.subject".to_string(),
            link_selector: "a".to_string(),
            image_selector: None,
            category_selector: None,
            date_selector: "span.timestamp".to_string(),
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }

    fn entry(name: &str, source_id: i64, keep_count: u64) -> SourceEntry {
        SourceEntry {
            name: name.to_string(),
            source_id,
            max_pages: 2,
            keep_count,
            board: board_stub(),
        }
    }

    fn config(sources: Vec<SourceEntry>) -> Config {
        Config {
            fetch: FetchConfig::default(),
            dedup: DedupConfig::default(),
            retention: RetentionConfig::default(),
            output: OutputConfig {
                database_path: ":memory:".to_string(),
                snapshot_dir: "./snapshots".to_string(),
            },
            sources,
        }
    }

    fn harvester_with(
        sources: Vec<SourceEntry>,
        scripted: Vec<ScriptedAdapter>,
    ) -> Harvester {
        let mut adapters: HashMap<String, Box<dyn SourceAdapter>> = HashMap::new();
        for adapter in scripted {
            adapters.insert(adapter.name.clone(), Box::new(adapter));
        }
        Harvester::with_adapters(config(sources), adapters)
    }

    fn newest_first(source_id: i64, count: u64) -> Vec<Deal> {
        // deal N is the newest; boards list downwards from it
        (0..count)
            .map(|i| {
                let n = count - i;
                deal(source_id, n, &format!("고유한 상품명 {}-{}", source_id, n))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_first_run_saves_everything() {
        let harvester = harvester_with(
            vec![entry("alpha", 1, 100)],
            vec![scripted("alpha", 1, newest_first(1, 5))],
        );
        let mut store = SqliteStore::new_in_memory().unwrap();

        let report = harvester.run(&mut store, None).await.unwrap();

        assert_eq!(report.total_crawled, 5);
        assert_eq!(report.total_saved, 5);
        assert_eq!(store.count_by_source(1).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_stop_marker_makes_second_run_idempotent() {
        let harvester = harvester_with(
            vec![entry("alpha", 1, 100)],
            vec![scripted("alpha", 1, newest_first(1, 5))],
        );
        let mut store = SqliteStore::new_in_memory().unwrap();

        harvester.run(&mut store, None).await.unwrap();
        let second = harvester.run(&mut store, None).await.unwrap();

        // The newest stored URL is the board's newest listing, so the
        // adapter stops before emitting anything
        assert_eq!(second.total_crawled, 0);
        assert_eq!(second.total_saved, 0);
        assert!(second.sources[0].stopped_early);
        assert_eq!(store.count_by_source(1).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_stop_marker_yields_only_newer_records() {
        let mut store = SqliteStore::new_in_memory().unwrap();

        // First run sees deals 3..1
        let harvester = harvester_with(
            vec![entry("alpha", 1, 100)],
            vec![scripted("alpha", 1, newest_first(1, 3))],
        );
        harvester.run(&mut store, None).await.unwrap();

        // The board gains deals 5 and 4 on top
        let harvester = harvester_with(
            vec![entry("alpha", 1, 100)],
            vec![scripted("alpha", 1, newest_first(1, 5))],
        );
        let report = harvester.run(&mut store, None).await.unwrap();

        assert_eq!(report.total_crawled, 2);
        assert_eq!(report.total_saved, 2);
        assert!(report.sources[0].stopped_early);
        assert_eq!(store.count_by_source(1).unwrap(), 5);

        // And the newest listing is now the stored stop marker
        let markers = store.latest_url_per_source().unwrap();
        assert_eq!(
            markers.get(&1).map(String::as_str),
            Some("https://board-1.example.com/deal/5")
        );
    }

    #[tokio::test]
    async fn test_failing_source_does_not_poison_the_run() {
        let harvester = harvester_with(
            vec![
                entry("broken", 1, 100),
                entry("beta", 2, 100),
                entry("gamma", 3, 100),
            ],
            vec![
                failing("broken", 1),
                scripted("beta", 2, newest_first(2, 3)),
                scripted("gamma", 3, newest_first(3, 2)),
            ],
        );
        let mut store = SqliteStore::new_in_memory().unwrap();

        let report = harvester.run(&mut store, None).await.unwrap();

        assert_eq!(report.failed_sources(), 1);
        assert_eq!(report.total_saved, 5);
        assert!(report.sources[0]
            .failed
            .as_deref()
            .unwrap()
            .contains("fetching"));
        assert_eq!(store.count_by_source(2).unwrap(), 3);
        assert_eq!(store.count_by_source(3).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cross_source_duplicate_suppressed() {
        let first = deal(1, 1, "[가전] 삼성 에어프라이어 50% 할인");
        let second = deal(2, 77, "삼성 에어프라이어 50%할인 특가");

        let harvester = harvester_with(
            vec![entry("alpha", 1, 100), entry("beta", 2, 100)],
            vec![
                scripted("alpha", 1, vec![first]),
                scripted("beta", 2, vec![second]),
            ],
        );
        let mut store = SqliteStore::new_in_memory().unwrap();

        let report = harvester.run(&mut store, None).await.unwrap();

        // Source beta's listing is the same product; only alpha's row lands
        assert_eq!(report.total_saved, 1);
        assert_eq!(report.sources[1].duplicates, 1);
        assert_eq!(store.count_by_source(2).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dedup_disabled_saves_near_duplicates() {
        let mut cfg = config(vec![entry("alpha", 1, 100), entry("beta", 2, 100)]);
        cfg.dedup.enabled = false;

        let mut adapters: HashMap<String, Box<dyn SourceAdapter>> = HashMap::new();
        adapters.insert(
            "alpha".to_string(),
            Box::new(scripted(
                "alpha",
                1,
                vec![deal(1, 1, "[가전] 삼성 에어프라이어 50% 할인")],
            )) as Box<dyn SourceAdapter>,
        );
        adapters.insert(
            "beta".to_string(),
            Box::new(scripted(
                "beta",
                2,
                vec![deal(2, 1, "삼성 에어프라이어 50%할인 특가")],
            )) as Box<dyn SourceAdapter>,
        );

        let harvester = Harvester::with_adapters(cfg, adapters);
        let mut store = SqliteStore::new_in_memory().unwrap();

        let report = harvester.run(&mut store, None).await.unwrap();
        assert_eq!(report.total_saved, 2);
    }

    #[tokio::test]
    async fn test_retention_applied_within_run() {
        let harvester = harvester_with(
            vec![entry("alpha", 1, 10)],
            vec![scripted("alpha", 1, newest_first(1, 15))],
        );
        let mut store = SqliteStore::new_in_memory().unwrap();

        let report = harvester.run(&mut store, None).await.unwrap();

        assert_eq!(report.total_saved, 15);
        assert!(store.count_by_source(1).unwrap() <= 10);
    }

    #[tokio::test]
    async fn test_single_source_restriction() {
        let harvester = harvester_with(
            vec![entry("alpha", 1, 100), entry("beta", 2, 100)],
            vec![
                scripted("alpha", 1, newest_first(1, 2)),
                scripted("beta", 2, newest_first(2, 2)),
            ],
        );
        let mut store = SqliteStore::new_in_memory().unwrap();

        let report = harvester.run(&mut store, Some("beta")).await.unwrap();

        assert_eq!(report.sources.len(), 1);
        assert_eq!(store.count_by_source(1).unwrap(), 0);
        assert_eq!(store.count_by_source(2).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_source_is_an_error() {
        let harvester = harvester_with(vec![entry("alpha", 1, 100)], vec![]);
        let mut store = SqliteStore::new_in_memory().unwrap();

        let result = harvester.run(&mut store, Some("nonexistent")).await;
        assert!(matches!(result, Err(SweepError::UnknownSource(_))));
    }

    #[tokio::test]
    async fn test_conflicts_counted_not_fatal() {
        // A marker-ignoring adapter re-offers all three deals; with the
        // dedup window disabled, the unique index absorbs them
        let mut cfg = config(vec![entry("alpha", 1, 100)]);
        cfg.dedup.enabled = false;

        let mut first_adapters: HashMap<String, Box<dyn SourceAdapter>> = HashMap::new();
        first_adapters.insert(
            "alpha".to_string(),
            Box::new(scripted("alpha", 1, newest_first(1, 3))) as Box<dyn SourceAdapter>,
        );
        let harvester = Harvester::with_adapters(cfg.clone(), first_adapters);

        let mut store = SqliteStore::new_in_memory().unwrap();
        harvester.run(&mut store, None).await.unwrap();

        let mut second_adapters: HashMap<String, Box<dyn SourceAdapter>> = HashMap::new();
        second_adapters.insert(
            "alpha".to_string(),
            Box::new(ScriptedAdapter {
                ignore_marker: true,
                ..scripted("alpha", 1, newest_first(1, 3))
            }) as Box<dyn SourceAdapter>,
        );
        let harvester = Harvester::with_adapters(cfg, second_adapters);

        let report = harvester.run(&mut store, None).await.unwrap();

        assert_eq!(report.total_saved, 0);
        assert_eq!(report.sources[0].conflicts, 3);
        assert!(report.sources[0].failed.is_none());
        assert_eq!(store.count_by_source(1).unwrap(), 3);
    }
}
