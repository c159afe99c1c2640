//! Store trait and error types

use crate::deal::Deal;
use crate::store::StoredDeal;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Other(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of a single insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The deal was new and is now persisted
    Inserted,

    /// A deal with this `(source_id, url)` already exists; expected
    /// under concurrent or repeated runs, counted rather than raised
    Conflict,
}

/// Trait for deal store backends
///
/// Every operation may fail; callers log and degrade (skip trimming,
/// skip the dedup window) rather than abort the run. Only the initial
/// open is fatal.
pub trait DealStore {
    /// Inserts one deal, relying on the store's `(source_id, url)`
    /// uniqueness constraint for safety under concurrent writers
    fn insert(&mut self, deal: &Deal) -> StoreResult<InsertOutcome>;

    /// Newest stored URL for every source, in one aggregate query
    ///
    /// This is the stop-marker lookup; it runs once per run, before any
    /// source starts, never once per source.
    fn latest_url_per_source(&self) -> StoreResult<HashMap<i64, String>>;

    /// `(url, title)` of deals stored at or after `since` (RFC 3339),
    /// across all sources; feeds the duplicate lookback window
    fn recent_deals(&self, since: &str) -> StoreResult<Vec<(String, String)>>;

    /// Number of stored deals for a source
    fn count_by_source(&self, source_id: i64) -> StoreResult<u64>;

    /// `created_at` of the `keep`-th newest deal for a source, if the
    /// source has at least `keep` deals; the retention cutoff
    fn nth_newest_created_at(&self, source_id: i64, keep: u64) -> StoreResult<Option<String>>;

    /// Deletes deals for a source created strictly before `cutoff`;
    /// returns the number deleted
    fn delete_older_than(&mut self, source_id: i64, cutoff: &str) -> StoreResult<u64>;

    /// All stored deals for a source, newest first (diagnostics, tests)
    fn deals_for_source(&self, source_id: i64) -> StoreResult<Vec<StoredDeal>>;
}
