//! Generic selector-driven board adapter
//!
//! One implementation covers every configured board: the markup shape
//! (selectors, page query parameter, date format) comes from the
//! board profile, the navigation comes from the fetch executor. A page
//! whose item selector matches nothing gets its HTML snapshotted for
//! offline diagnosis and yields zero records without retrying.

use crate::adapter::datetime::parse_posted_at;
use crate::adapter::{CrawlOutcome, SourceAdapter};
use crate::config::{BoardProfile, SourceEntry};
use crate::deal::{title_is_valid, Deal};
use crate::fetch::{build_http_client, fetch_page, FetchProfile};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::path::PathBuf;
use url::Url;

/// `[category]` prefix pattern in titles
static RE_TITLE_CATEGORY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]").unwrap());

/// How many characters of a page to keep in a diagnostic snapshot
const SNAPSHOT_LIMIT: usize = 5000;

/// Compiled selectors for one board profile
struct BoardSelectors {
    item: Selector,
    title: Selector,
    link: Selector,
    image: Option<Selector>,
    category: Option<Selector>,
    date: Selector,
}

impl BoardSelectors {
    fn compile(board: &BoardProfile) -> Result<Self, String> {
        let parse = |s: &str| Selector::parse(s).map_err(|e| format!("selector '{}': {:?}", s, e));

        Ok(Self {
            item: parse(&board.item_selector)?,
            title: parse(&board.title_selector)?,
            link: parse(&board.link_selector)?,
            image: board.image_selector.as_deref().map(parse).transpose()?,
            category: board.category_selector.as_deref().map(parse).transpose()?,
            date: parse(&board.date_selector)?,
        })
    }
}

/// Selector-driven adapter for one configured board
pub struct BoardAdapter {
    name: String,
    source_id: i64,
    board: BoardProfile,
    base_url: Url,
    selectors: BoardSelectors,
    profile: FetchProfile,
    client: Client,
    snapshot_dir: PathBuf,
}

impl BoardAdapter {
    /// Builds an adapter from one source entry
    ///
    /// `index` is the source's position in the registry and picks the
    /// user agent for this adapter's dedicated client.
    pub fn from_entry(
        entry: &SourceEntry,
        profile: FetchProfile,
        snapshot_dir: PathBuf,
        index: usize,
    ) -> crate::Result<Self> {
        let selectors =
            BoardSelectors::compile(&entry.board).map_err(|message| crate::SweepError::Adapter {
                source_name: entry.name.clone(),
                message,
            })?;

        let base_url = Url::parse(&entry.board.base_url)?;
        let client = build_http_client(&profile, index)?;

        Ok(Self {
            name: entry.name.clone(),
            source_id: entry.source_id,
            board: entry.board.clone(),
            base_url,
            selectors,
            profile,
            client,
            snapshot_dir,
        })
    }

    /// URL of the zero-based `page`-th list page
    fn page_url(&self, page: u32) -> String {
        if page == 0 {
            self.board.list_url.clone()
        } else {
            let sep = if self.board.list_url.contains('?') {
                '&'
            } else {
                '?'
            };
            format!(
                "{}{}{}={}",
                self.board.list_url, sep, self.board.page_param, page
            )
        }
    }

    /// Parses one list page
    ///
    /// Returns the parsed deals plus whether the stop marker was seen.
    /// Synchronous on purpose: the parsed document must not live across
    /// an await point.
    fn parse_list(
        &self,
        body: &str,
        page: u32,
        stop_marker: Option<&str>,
        seen: &mut HashSet<String>,
    ) -> (Vec<Deal>, bool) {
        let document = Html::parse_document(body);
        let mut deals = Vec::new();

        let items: Vec<ElementRef> = document.select(&self.selectors.item).collect();
        if items.is_empty() {
            tracing::warn!(
                "{}: no listings on page {} - markup may have changed",
                self.name,
                page + 1
            );
            self.save_snapshot(body, page);
            return (deals, false);
        }

        let now = chrono::Local::now().naive_local();

        for item in items {
            let deal = match self.parse_item(&item, now) {
                Some(deal) => deal,
                None => continue,
            };

            // Reaching the previous run's newest record ends the whole
            // crawl; the matching record itself is not re-emitted
            if stop_marker == Some(deal.url.as_str()) {
                tracing::info!("{}: reached previous harvest point: {}", self.name, deal.url);
                return (deals, true);
            }

            // A list view may link the same item twice
            if !seen.insert(deal.url.clone()) {
                continue;
            }

            deals.push(deal);
        }

        (deals, false)
    }

    /// Parses one listing row; rows missing a usable title, link, or
    /// posted time are dropped
    fn parse_item(&self, item: &ElementRef, now: chrono::NaiveDateTime) -> Option<Deal> {
        let title = item
            .select(&self.selectors.title)
            .next()
            .map(|el| element_text(&el))?;
        if !title_is_valid(&title) {
            return None;
        }

        let href = item
            .select(&self.selectors.link)
            .next()
            .and_then(|el| el.value().attr("href"))?;
        let url = self.absolutize(href)?;

        let raw_date = item
            .select(&self.selectors.date)
            .next()
            .map(|el| element_text(&el))?;
        let posted_at = match parse_posted_at(&raw_date, &self.board.date_format, now) {
            Ok(dt) => dt,
            Err(e) => {
                tracing::debug!("{}: dropping row: {}", self.name, e);
                return None;
            }
        };

        let image_url = self.selectors.image.as_ref().and_then(|sel| {
            item.select(sel)
                .next()
                .and_then(|el| {
                    el.value()
                        .attr("src")
                        .or_else(|| el.value().attr("data-src"))
                })
                .and_then(|src| self.absolutize(src))
        });

        let category = self.extract_category(item, &title);

        Some(Deal {
            title,
            url,
            image_url,
            category,
            posted_at,
            source_id: self.source_id,
        })
    }

    /// Category from the row's own element, else from a `[tag]` prefix
    /// in the title, else empty
    fn extract_category(&self, item: &ElementRef, title: &str) -> String {
        if let Some(sel) = &self.selectors.category {
            if let Some(el) = item.select(sel).next() {
                return normalize_category(&element_text(&el));
            }
        }

        RE_TITLE_CATEGORY
            .captures(title)
            .and_then(|c| c.get(1))
            .map(|m| normalize_category(m.as_str()))
            .unwrap_or_default()
    }

    /// Resolves a possibly relative href against the board's base URL,
    /// dropping any fragment
    fn absolutize(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }

        let mut url = if href.starts_with("//") {
            Url::parse(&format!("https:{}", href)).ok()?
        } else {
            self.base_url.join(href).ok()?
        };

        if url.scheme() != "http" && url.scheme() != "https" {
            return None;
        }

        url.set_fragment(None);
        Some(url.to_string())
    }

    /// Saves a truncated copy of an unparsable page for offline diagnosis
    fn save_snapshot(&self, body: &str, page: u32) {
        let truncated: String = body.chars().take(SNAPSHOT_LIMIT).collect();
        let path = self
            .snapshot_dir
            .join(format!("{}_page{}.html", self.name, page + 1));

        if let Err(e) = std::fs::create_dir_all(&self.snapshot_dir)
            .and_then(|_| std::fs::write(&path, truncated))
        {
            tracing::warn!("{}: failed to save snapshot {:?}: {}", self.name, path, e);
        } else {
            tracing::info!("{}: page snapshot saved to {:?}", self.name, path);
        }
    }
}

#[async_trait]
impl SourceAdapter for BoardAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_id(&self) -> i64 {
        self.source_id
    }

    async fn crawl(&self, max_pages: u32, stop_marker: Option<&str>) -> crate::Result<CrawlOutcome> {
        tracing::info!(
            "{}: crawl starting (up to {} pages{})",
            self.name,
            max_pages,
            if stop_marker.is_some() {
                ", incremental"
            } else {
                ", unconditional"
            }
        );

        let mut outcome = CrawlOutcome::default();
        let mut seen = HashSet::new();

        for page in 0..max_pages {
            let url = self.page_url(page);

            let body = match fetch_page(&self.client, &url, &self.profile).await {
                Ok(body) => body,
                Err(failure) => {
                    // Exhausted retries degrade to an empty page, never
                    // past the adapter boundary
                    tracing::warn!("{}: {}", self.name, failure);
                    continue;
                }
            };

            let (deals, stop) = self.parse_list(&body, page, stop_marker, &mut seen);
            tracing::info!(
                "{}: page {} yielded {} deals",
                self.name,
                page + 1,
                deals.len()
            );
            outcome.deals.extend(deals);

            if stop {
                outcome.stopped_early = true;
                break;
            }
        }

        tracing::info!(
            "{}: crawl finished with {} deals (stopped_early: {})",
            self.name,
            outcome.deals.len(),
            outcome.stopped_early
        );
        Ok(outcome)
    }
}

/// Collects and trims an element's text content
fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Normalizes a category label: strip surrounding brackets, commas,
/// and whitespace
fn normalize_category(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim()
        .trim_matches(',')
        .to_string()
}
