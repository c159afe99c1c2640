//! Database schema definitions

/// SQL schema for the deal store
pub const SCHEMA_SQL: &str = r#"
-- Harvested deals, one row per (source, listing URL)
CREATE TABLE IF NOT EXISTS deals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    image_url TEXT,
    category TEXT NOT NULL DEFAULT '',
    posted_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(source_id, url)
);

CREATE INDEX IF NOT EXISTS idx_deals_source ON deals(source_id);
CREATE INDEX IF NOT EXISTS idx_deals_created ON deals(created_at);
CREATE INDEX IF NOT EXISTS idx_deals_source_created ON deals(source_id, created_at);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_unique_source_url() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO deals (source_id, url, title, posted_at, created_at)
             VALUES (1, 'https://a/1', 't1', '2025-03-01 00:00:00', '2025-03-01T00:00:00Z')",
            [],
        )
        .unwrap();

        // Same URL, same source: rejected
        let dup = conn.execute(
            "INSERT INTO deals (source_id, url, title, posted_at, created_at)
             VALUES (1, 'https://a/1', 't2', '2025-03-01 00:00:00', '2025-03-01T00:00:00Z')",
            [],
        );
        assert!(dup.is_err());

        // Same URL, different source: allowed
        let other = conn.execute(
            "INSERT INTO deals (source_id, url, title, posted_at, created_at)
             VALUES (2, 'https://a/1', 't3', '2025-03-01 00:00:00', '2025-03-01T00:00:00Z')",
            [],
        );
        assert!(other.is_ok());
    }
}
