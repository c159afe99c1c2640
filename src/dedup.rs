//! Near-duplicate suppression for freshly crawled deals
//!
//! Two-stage filter applied to a batch before persistence:
//! 1. Exact: the candidate URL already exists among deals stored within
//!    the lookback window.
//! 2. Fuzzy: normalized-title similarity against every title in the
//!    window, rejected at or above a configured threshold.
//!
//! Titles are normalized by stripping bracketed category tags, currency
//! amounts, and all non-alphanumeric characters (Hangul preserved), then
//! lowercasing. Similarity is a longest-common-subsequence ratio in
//! [0, 1]. The scan is O(new x existing), which is fine at tens to low
//! hundreds of records per run; `LookbackWindow` is the seam where a
//! keyword-bucketing step would slot in if the window ever grows large.

use crate::deal::Deal;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static RE_BRACKET_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]|【[^】]*】").unwrap());
static RE_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+[,\d]*원|\d+만원").unwrap());

/// Normalizes a title for comparison
///
/// Removes `[category]` tags, won-amount price fragments, and every
/// non-alphanumeric character, then lowercases. Hangul syllables count
/// as alphanumeric and survive.
pub fn normalize_title(title: &str) -> String {
    let stripped = RE_BRACKET_TAG.replace_all(title, "");
    let stripped = RE_PRICE.replace_all(&stripped, "");

    stripped
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Similarity of two titles after normalization, in [0, 1]
///
/// Computed as `2 * LCS(a, b) / (|a| + |b|)` over characters. Returns
/// 0.0 when either side normalizes to nothing.
pub fn similarity(title_a: &str, title_b: &str) -> f64 {
    let a: Vec<char> = normalize_title(title_a).chars().collect();
    let b: Vec<char> = normalize_title(title_b).chars().collect();

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let lcs = lcs_length(&a, &b);
    (2 * lcs) as f64 / (a.len() + b.len()) as f64
}

/// Longest common subsequence length, two-row dynamic programming
fn lcs_length(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Recently stored deals a batch is compared against
///
/// Built once per source from the store's lookback query. Accepted
/// candidates are folded in as the batch is filtered, so a batch cannot
/// introduce two near-identical deals in one pass.
#[derive(Debug, Default)]
pub struct LookbackWindow {
    urls: HashSet<String>,
    titles: Vec<String>,
}

impl LookbackWindow {
    /// Builds a window from `(url, title)` rows
    pub fn from_rows(rows: Vec<(String, String)>) -> Self {
        let mut urls = HashSet::with_capacity(rows.len());
        let mut titles = Vec::with_capacity(rows.len());

        for (url, title) in rows {
            urls.insert(url);
            titles.push(normalize_title(&title));
        }

        Self { urls, titles }
    }

    /// An empty window; every candidate passes
    pub fn empty() -> Self {
        Self::default()
    }

    fn contains_url(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// First stored title at or above the threshold, if any
    ///
    /// First match wins; the filter never looks for the best match,
    /// only a match.
    fn similar_title(&self, normalized: &str, threshold: f64) -> Option<&str> {
        if normalized.is_empty() {
            return None;
        }

        let candidate: Vec<char> = normalized.chars().collect();
        self.titles
            .iter()
            .find(|existing| {
                if existing.is_empty() {
                    return false;
                }
                let other: Vec<char> = existing.chars().collect();
                let lcs = lcs_length(&candidate, &other);
                let ratio = (2 * lcs) as f64 / (candidate.len() + other.len()) as f64;
                ratio >= threshold
            })
            .map(|s| s.as_str())
    }

    fn admit(&mut self, url: &str, normalized_title: String) {
        self.urls.insert(url.to_string());
        self.titles.push(normalized_title);
    }
}

/// Result of filtering one batch
#[derive(Debug)]
pub struct FilterOutcome {
    /// Deals that survived both stages, in input order
    pub kept: Vec<Deal>,

    /// Dropped by the exact URL check
    pub dropped_exact: usize,

    /// Dropped by the similarity check
    pub dropped_similar: usize,
}

/// Filters a batch of crawled deals against the lookback window
///
/// Deals are read-only here; rejection is binary and the batch order is
/// preserved for the survivors.
pub fn filter_duplicates(
    batch: Vec<Deal>,
    window: &mut LookbackWindow,
    threshold: f64,
) -> FilterOutcome {
    let mut kept = Vec::with_capacity(batch.len());
    let mut dropped_exact = 0;
    let mut dropped_similar = 0;

    for deal in batch {
        if window.contains_url(&deal.url) {
            tracing::debug!("Duplicate URL, dropping: {}", deal.url);
            dropped_exact += 1;
            continue;
        }

        let normalized = normalize_title(&deal.title);
        if let Some(existing) = window.similar_title(&normalized, threshold) {
            tracing::debug!(
                "Near-duplicate title, dropping '{}' (matches '{}')",
                deal.title,
                existing
            );
            dropped_similar += 1;
            continue;
        }

        window.admit(&deal.url, normalized);
        kept.push(deal);
    }

    FilterOutcome {
        kept,
        dropped_exact,
        dropped_similar,
    }
}
