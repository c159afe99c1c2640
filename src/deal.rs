//! The listing record flowing through the harvest pipeline

use chrono::NaiveDateTime;

/// Canonical on-disk representation of a posted-at timestamp
pub const POSTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One harvested listing ("deal") from a community board
///
/// Deals are created by an adapter call, pass read-only through the
/// duplicate filter, and are either persisted (immutable thereafter)
/// or discarded. Only the retention enforcer ever deletes them.
#[derive(Debug, Clone, PartialEq)]
pub struct Deal {
    /// Listing title, trimmed, at least 3 characters
    pub title: String,

    /// Absolute, canonicalized listing URL; identity key within a source
    pub url: String,

    /// Thumbnail image URL, if the board exposes one
    pub image_url: Option<String>,

    /// Category label, possibly empty
    pub category: String,

    /// Source-local posted time, normalized to `YYYY-MM-DD HH:MM:SS`
    pub posted_at: NaiveDateTime,

    /// Stable identifier of the originating source
    pub source_id: i64,
}

impl Deal {
    /// Formats the posted time in the canonical representation
    pub fn posted_at_str(&self) -> String {
        self.posted_at.format(POSTED_AT_FORMAT).to_string()
    }
}

/// Checks whether a raw title is usable: non-empty and at least
/// 3 characters after trimming
pub fn title_is_valid(raw: &str) -> bool {
    raw.trim().chars().count() >= 3
}
