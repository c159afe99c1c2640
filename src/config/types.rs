use serde::Deserialize;

/// Main configuration structure for dealsweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

/// Fetch/retry executor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Maximum navigation attempts per page
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff unit between attempts (milliseconds); attempt N waits N x base
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Per-navigation timeout (milliseconds) in an interactive environment
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Post-load settle delay (milliseconds) for client-side rendering
    #[serde(rename = "settle-delay-ms", default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

/// Duplicate detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Normalized-title similarity at or above which a candidate is rejected
    #[serde(rename = "similarity-threshold", default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Recency span of stored deals considered for duplicate comparison
    #[serde(rename = "lookback-days", default = "default_lookback_days")]
    pub lookback_days: i64,
}

/// Retention (cleanup) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory where page snapshots are written when a board's
    /// markup stops matching its selectors
    #[serde(rename = "snapshot-dir", default = "default_snapshot_dir")]
    pub snapshot_dir: String,
}

/// One configured deal-board source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    /// Registry key, e.g. "clien"
    pub name: String,

    /// Stable identifier used in the store
    #[serde(rename = "source-id")]
    pub source_id: i64,

    /// Maximum list pages to visit in one run
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Retention ceiling: newest records kept for this source
    #[serde(rename = "keep-count", default = "default_keep_count")]
    pub keep_count: u64,

    /// How the board's list markup is shaped
    pub board: BoardProfile,
}

/// Markup shape of a board's list view, consumed by the generic adapter
#[derive(Debug, Clone, Deserialize)]
pub struct BoardProfile {
    /// Board base URL used to absolutize relative links
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// URL of the first list page
    #[serde(rename = "list-url")]
    pub list_url: String,

    /// Query parameter carrying the zero-based page index, e.g. "po"
    #[serde(rename = "page-param")]
    pub page_param: String,

    /// CSS selector matching one listing row
    #[serde(rename = "item-selector")]
    pub item_selector: String,

    /// CSS selector for the title element within a row
    #[serde(rename = "title-selector")]
    pub title_selector: String,

    /// CSS selector for the link element within a row
    #[serde(rename = "link-selector")]
    pub link_selector: String,

    /// CSS selector for the thumbnail image, if any
    #[serde(rename = "image-selector", default)]
    pub image_selector: Option<String>,

    /// CSS selector for the category label, if any
    #[serde(rename = "category-selector", default)]
    pub category_selector: Option<String>,

    /// CSS selector for the posted-time element within a row
    #[serde(rename = "date-selector")]
    pub date_selector: String,

    /// strftime-style hint for the board's full posted-time format
    #[serde(rename = "date-format", default = "default_date_format")]
    pub date_format: String,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    2000
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_settle_delay_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_lookback_days() -> i64 {
    7
}

fn default_snapshot_dir() -> String {
    "./snapshots".to_string()
}

fn default_max_pages() -> u32 {
    1
}

fn default_keep_count() -> u64 {
    200
}

fn default_date_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            timeout_ms: default_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: default_similarity_threshold(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
