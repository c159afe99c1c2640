//! Store module for persisting harvested deals
//!
//! This module owns all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Deal persistence behind the conflict-aware insert
//! - The per-source newest-URL aggregate (stop-marker lookup)
//! - The lookback-window read used by duplicate detection
//! - The count/cutoff/delete primitives used by retention

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{DealStore, InsertOutcome, StoreError, StoreResult};

use std::path::Path;

use crate::SweepError;

/// Initializes or opens the deal store
///
/// This is the only operation whose failure aborts a run; everything
/// downstream degrades per-source instead.
pub fn open_store(path: &Path) -> Result<SqliteStore, SweepError> {
    SqliteStore::new(path)
}

/// A deal row as stored
#[derive(Debug, Clone)]
pub struct StoredDeal {
    pub id: i64,
    pub source_id: i64,
    pub url: String,
    pub title: String,
    pub image_url: Option<String>,
    pub category: String,
    pub posted_at: String,
    pub created_at: String,
}
