//! Per-source retention enforcement
//!
//! Trims a source to its newest `keep_count` deals by finding the
//! creation-time cutoff of the `keep_count`-th newest row and deleting
//! everything older. No transaction spans the count and the delete, so
//! the count can shift between the two reads; over-deletion below the
//! ceiling by a small margin is acceptable, under-deletion is detected
//! by a recount and logged.

use crate::store::{DealStore, StoreResult};

/// Trims one source to its retention ceiling
///
/// Returns the number of deleted rows. A source at or under the ceiling
/// is a no-op.
pub fn enforce(store: &mut dyn DealStore, source_id: i64, keep_count: u64) -> StoreResult<u64> {
    let count = store.count_by_source(source_id)?;

    if count <= keep_count {
        tracing::debug!(
            "Source {}: {} deals within ceiling {}, nothing to trim",
            source_id,
            count,
            keep_count
        );
        return Ok(0);
    }

    let cutoff = match store.nth_newest_created_at(source_id, keep_count)? {
        Some(cutoff) => cutoff,
        None => {
            // The source shrank below the ceiling between the two reads
            tracing::debug!("Source {}: no cutoff found, skipping trim", source_id);
            return Ok(0);
        }
    };

    let deleted = store.delete_older_than(source_id, &cutoff)?;
    tracing::info!(
        "Source {}: trimmed {} deals older than {}",
        source_id,
        deleted,
        cutoff
    );

    // Ties on the cutoff timestamp can leave the source over its
    // ceiling; that must be visible, not silent
    let remaining = store.count_by_source(source_id)?;
    if remaining > keep_count {
        tracing::warn!(
            "Source {}: still {} deals after trim (ceiling {})",
            source_id,
            remaining,
            keep_count
        );
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deal::{Deal, POSTED_AT_FORMAT};
    use crate::store::SqliteStore;
    use chrono::NaiveDateTime;

    fn deal(source_id: i64, n: u64) -> Deal {
        Deal {
            title: format!("특가 딜 {}", n),
            url: format!("https://board-{}.example.com/deal/{}", source_id, n),
            image_url: None,
            category: String::new(),
            posted_at: NaiveDateTime::parse_from_str("2025-03-01 10:00:00", POSTED_AT_FORMAT)
                .unwrap(),
            source_id,
        }
    }

    /// Inserts n deals with strictly increasing created_at values
    fn seed(store: &mut SqliteStore, source_id: i64, n: u64) {
        for i in 0..n {
            store.insert(&deal(source_id, i)).unwrap();
            // created_at comes from the wall clock; spacing rows apart
            // keeps the newest-K cutoff unambiguous in tests
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
    }

    #[test]
    fn test_noop_under_ceiling() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        seed(&mut store, 1, 5);

        let deleted = enforce(&mut store, 1, 10).unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(store.count_by_source(1).unwrap(), 5);
    }

    #[test]
    fn test_noop_exactly_at_ceiling() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        seed(&mut store, 1, 10);

        let deleted = enforce(&mut store, 1, 10).unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(store.count_by_source(1).unwrap(), 10);
    }

    #[test]
    fn test_trims_to_newest_k() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        seed(&mut store, 1, 15);

        let deleted = enforce(&mut store, 1, 10).unwrap();
        assert_eq!(deleted, 5);
        assert_eq!(store.count_by_source(1).unwrap(), 10);

        // The survivors are the newest ones
        let rows = store.deals_for_source(1).unwrap();
        assert_eq!(rows[0].url, "https://board-1.example.com/deal/14");
        assert_eq!(rows[9].url, "https://board-1.example.com/deal/5");
    }

    #[test]
    fn test_two_source_scenario() {
        // Source 1 over the ceiling, source 2 under it
        let mut store = SqliteStore::new_in_memory().unwrap();
        seed(&mut store, 1, 150);
        seed(&mut store, 2, 80);

        enforce(&mut store, 1, 100).unwrap();
        enforce(&mut store, 2, 100).unwrap();

        assert_eq!(store.count_by_source(1).unwrap(), 100);
        assert_eq!(store.count_by_source(2).unwrap(), 80);
    }
}
