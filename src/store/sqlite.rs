//! SQLite store implementation

use crate::deal::Deal;
use crate::store::schema::initialize_schema;
use crate::store::traits::{DealStore, InsertOutcome, StoreResult};
use crate::store::StoredDeal;
use crate::SweepError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

/// SQLite store backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(SweepError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SweepError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store (for testing)
    pub fn new_in_memory() -> Result<Self, SweepError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn row_to_deal(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredDeal> {
        Ok(StoredDeal {
            id: row.get(0)?,
            source_id: row.get(1)?,
            url: row.get(2)?,
            title: row.get(3)?,
            image_url: row.get(4)?,
            category: row.get(5)?,
            posted_at: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl DealStore for SqliteStore {
    fn insert(&mut self, deal: &Deal) -> StoreResult<InsertOutcome> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "INSERT INTO deals (source_id, url, title, image_url, category, posted_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(source_id, url) DO NOTHING",
            params![
                deal.source_id,
                deal.url,
                deal.title,
                deal.image_url,
                deal.category,
                deal.posted_at_str(),
                now,
            ],
        )?;

        if changed == 0 {
            Ok(InsertOutcome::Conflict)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    fn latest_url_per_source(&self) -> StoreResult<HashMap<i64, String>> {
        // Single aggregate query across all sources; the newest row per
        // source is the one inserted last
        let mut stmt = self.conn.prepare(
            "SELECT source_id, url FROM deals
             WHERE id IN (SELECT MAX(id) FROM deals GROUP BY source_id)",
        )?;

        let mut markers = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (source_id, url) = row?;
            markers.insert(source_id, url);
        }

        Ok(markers)
    }

    fn recent_deals(&self, since: &str) -> StoreResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, title FROM deals WHERE created_at >= ?1")?;

        let rows = stmt
            .query_map(params![since], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn count_by_source(&self, source_id: i64) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM deals WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn nth_newest_created_at(&self, source_id: i64, keep: u64) -> StoreResult<Option<String>> {
        if keep == 0 {
            return Ok(None);
        }

        let cutoff: Option<String> = self
            .conn
            .query_row(
                "SELECT created_at FROM deals WHERE source_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1 OFFSET ?2",
                params![source_id, (keep - 1) as i64],
                |row| row.get(0),
            )
            .optional()?;

        Ok(cutoff)
    }

    fn delete_older_than(&mut self, source_id: i64, cutoff: &str) -> StoreResult<u64> {
        let deleted = self.conn.execute(
            "DELETE FROM deals WHERE source_id = ?1 AND created_at < ?2",
            params![source_id, cutoff],
        )?;
        Ok(deleted as u64)
    }

    fn deals_for_source(&self, source_id: i64) -> StoreResult<Vec<StoredDeal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, url, title, image_url, category, posted_at, created_at
             FROM deals WHERE source_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;

        let deals = stmt
            .query_map(params![source_id], Self::row_to_deal)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(deals)
    }
}
