//! Fetch/retry executor
//!
//! This module performs all page navigation for the adapters, including:
//! - Building HTTP clients with desktop-browser user agent strings
//! - Bounded retries with linear-multiple backoff between attempts
//! - A fixed post-load settle delay for client-side rendering
//! - Environment-aware timeouts for constrained CI-like runners
//!
//! Every adapter depends on this executor instead of carrying its own
//! retry loop.

use crate::config::FetchConfig;
use crate::SweepError;
use reqwest::Client;
use std::time::Duration;

/// Desktop browser user agents, rotated per source to avoid blocking
const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Resolved fetch settings for the current execution environment
///
/// A constrained runner (GitHub Actions or similar CI) gets longer
/// timeouts, settle delays, and backoff than an interactive machine.
/// This is a configuration switch resolved once at startup, not a
/// behavioral branch in the retry logic.
#[derive(Debug, Clone)]
pub struct FetchProfile {
    /// Maximum navigation attempts per page
    pub max_attempts: u32,

    /// Backoff unit; attempt N sleeps N x this before retrying
    pub backoff_base: Duration,

    /// Per-navigation timeout, applied independently to each attempt
    pub timeout: Duration,

    /// Fixed delay after a successful load
    pub settle_delay: Duration,
}

impl FetchProfile {
    /// Resolves a profile from config, detecting the environment
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::from_config_with_env(config, constrained_environment())
    }

    /// Resolves a profile with an explicit environment flag
    pub fn from_config_with_env(config: &FetchConfig, constrained: bool) -> Self {
        let (timeout_ms, settle_ms, backoff_ms) = if constrained {
            (
                config.timeout_ms * 2,
                config.settle_delay_ms * 3 / 2,
                config.backoff_base_ms * 3 / 2,
            )
        } else {
            (
                config.timeout_ms,
                config.settle_delay_ms,
                config.backoff_base_ms,
            )
        };

        Self {
            max_attempts: config.max_attempts,
            backoff_base: Duration::from_millis(backoff_ms),
            timeout: Duration::from_millis(timeout_ms),
            settle_delay: Duration::from_millis(settle_ms),
        }
    }

    /// Backoff before retrying after the given 1-based attempt
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

/// Checks whether we are running on a constrained CI-like runner
fn constrained_environment() -> bool {
    std::env::var("GITHUB_ACTIONS").as_deref() == Ok("true")
        || std::env::var("CI").as_deref() == Ok("true")
}

/// A fetch that exhausted all attempts, carrying the last error
///
/// Callers treat this as "no data for this page" rather than a fatal
/// condition; it never propagates past the adapter boundary.
#[derive(Debug)]
pub struct FetchFailure {
    pub url: String,
    pub attempts: u32,
    pub last_error: String,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fetch of {} failed after {} attempts: {}",
            self.url, self.attempts, self.last_error
        )
    }
}

impl From<FetchFailure> for SweepError {
    fn from(failure: FetchFailure) -> Self {
        SweepError::FetchExhausted {
            url: failure.url,
            attempts: failure.attempts,
            last_error: failure.last_error,
        }
    }
}

/// Builds an HTTP client for one source
///
/// Each source owns its own client for its whole run; sessions are
/// never shared across sources. The user agent rotates with the
/// source's position in the registry.
pub fn build_http_client(profile: &FetchProfile, ua_index: usize) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENTS[ua_index % USER_AGENTS.len()])
        .timeout(profile.timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page body with bounded retries
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Success (2xx) | Settle delay, return body |
/// | Non-2xx status | Retry with backoff |
/// | Timeout / network error | Retry with backoff |
/// | Attempts exhausted | Return `FetchFailure` with the last error |
///
/// Backoff between attempts is `attempt x backoff_base` (2s, 4s, 6s at
/// defaults). Each attempt carries its own navigation timeout via the
/// client, so a hung navigation cannot stall the run.
pub async fn fetch_page(
    client: &Client,
    url: &str,
    profile: &FetchProfile,
) -> Result<String, FetchFailure> {
    let mut last_error = String::new();

    for attempt in 1..=profile.max_attempts {
        match try_fetch(client, url).await {
            Ok(body) => {
                // Allow client-side rendering to finish before the
                // caller parses the content
                tokio::time::sleep(profile.settle_delay).await;
                return Ok(body);
            }
            Err(e) => {
                last_error = e;
                if attempt < profile.max_attempts {
                    let wait = profile.backoff_after(attempt);
                    tracing::warn!(
                        "Page load failed (attempt {}/{}): {} - retrying in {:?}",
                        attempt,
                        profile.max_attempts,
                        last_error,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    tracing::error!(
        "Page load failed for good: {} - {}",
        url,
        last_error
    );

    Err(FetchFailure {
        url: url.to_string(),
        attempts: profile.max_attempts,
        last_error,
    })
}

/// One navigation attempt
async fn try_fetch(client: &Client, url: &str) -> Result<String, String> {
    let response = client.get(url).send().await.map_err(classify_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }

    response.text().await.map_err(classify_error)
}

/// Classifies a reqwest error into a short description
fn classify_error(e: reqwest::Error) -> String {
    if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        "connection refused".to_string()
    } else {
        e.to_string()
    }
}
