use crate::config::types::{Config, DedupConfig, FetchConfig, SourceEntry};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_dedup_config(&config.dedup)?;
    validate_output_config(config)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates fetch executor configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "fetch.max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "fetch.timeout-ms must be >= 1000ms, got {}ms",
            config.timeout_ms
        )));
    }

    Ok(())
}

/// Validates duplicate detection configuration
fn validate_dedup_config(config: &DedupConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&config.similarity_threshold) {
        return Err(ConfigError::Validation(format!(
            "dedup.similarity-threshold must be within [0.0, 1.0], got {}",
            config.similarity_threshold
        )));
    }

    if config.lookback_days < 1 {
        return Err(ConfigError::Validation(format!(
            "dedup.lookback-days must be >= 1, got {}",
            config.lookback_days
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &Config) -> Result<(), ConfigError> {
    if config.output.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "output.database-path cannot be empty".to_string(),
        ));
    }

    if config.output.snapshot_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output.snapshot-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates source entries: names and IDs must be unique, boards well-formed
fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    let mut ids = HashSet::new();

    for entry in sources {
        if entry.name.is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        if !names.insert(entry.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                entry.name
            )));
        }

        if !ids.insert(entry.source_id) {
            return Err(ConfigError::Validation(format!(
                "duplicate source-id {} (source '{}')",
                entry.source_id, entry.name
            )));
        }

        if entry.max_pages < 1 {
            return Err(ConfigError::Validation(format!(
                "source '{}': max-pages must be >= 1",
                entry.name
            )));
        }

        if entry.keep_count < 1 {
            return Err(ConfigError::Validation(format!(
                "source '{}': keep-count must be >= 1",
                entry.name
            )));
        }

        validate_board(entry)?;
    }

    Ok(())
}

/// Validates one board profile
fn validate_board(entry: &SourceEntry) -> Result<(), ConfigError> {
    let board = &entry.board;

    for (field, value) in [
        ("base-url", &board.base_url),
        ("list-url", &board.list_url),
    ] {
        let url = Url::parse(value).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "source '{}': invalid {} '{}': {}",
                entry.name, field, value, e
            ))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "source '{}': {} must be HTTP(S)",
                entry.name, field
            )));
        }
    }

    if board.page_param.is_empty() {
        return Err(ConfigError::Validation(format!(
            "source '{}': page-param cannot be empty",
            entry.name
        )));
    }

    for (field, selector) in [
        ("item-selector", &board.item_selector),
        ("title-selector", &board.title_selector),
        ("link-selector", &board.link_selector),
        ("date-selector", &board.date_selector),
    ] {
        if selector.is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}': {} cannot be empty",
                entry.name, field
            )));
        }

        if scraper::Selector::parse(selector).is_err() {
            return Err(ConfigError::Validation(format!(
                "source '{}': {} '{}' is not a valid CSS selector",
                entry.name, field, selector
            )));
        }
    }

    Ok(())
}
