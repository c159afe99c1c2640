//! Dealsweep main entry point
//!
//! Command-line interface for the incremental hot-deal harvester.

use anyhow::Context;
use clap::Parser;
use dealsweep::config::load_config_with_hash;
use dealsweep::harvest::Harvester;
use dealsweep::store::{open_store, DealStore};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Dealsweep: an incremental hot-deal harvester
///
/// Dealsweep crawls a fixed set of community deal boards, filters
/// near-duplicate listings, persists only genuinely new deals, and
/// keeps each source trimmed to its retention ceiling.
#[derive(Parser, Debug)]
#[command(name = "dealsweep")]
#[command(version = "0.1.0")]
#[command(about = "An incremental hot-deal harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Restrict the run to a single configured source
    #[arg(short, long, value_name = "NAME")]
    source: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show per-source deal counts from the store and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    if cli.stats {
        return handle_stats(&config);
    }

    handle_run(config, cli.source.as_deref()).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("dealsweep=info,warn"),
            1 => EnvFilter::new("dealsweep=debug,info"),
            2 => EnvFilter::new("dealsweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(config: &dealsweep::config::Config) {
    println!("=== Dealsweep Dry Run ===\n");

    println!("Fetch:");
    println!("  Max attempts: {}", config.fetch.max_attempts);
    println!("  Backoff base: {}ms", config.fetch.backoff_base_ms);
    println!("  Timeout: {}ms", config.fetch.timeout_ms);

    println!("\nDuplicate check:");
    println!("  Enabled: {}", config.dedup.enabled);
    println!("  Threshold: {}", config.dedup.similarity_threshold);
    println!("  Lookback: {} days", config.dedup.lookback_days);

    println!("\nRetention enabled: {}", config.retention.enabled);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Snapshots: {}", config.output.snapshot_dir);

    println!("\nSources ({}):", config.sources.len());
    for entry in &config.sources {
        println!(
            "  - {} (id {}, {} pages, keep {})",
            entry.name, entry.source_id, entry.max_pages, entry.keep_count
        );
        println!("    {}", entry.board.list_url);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows per-source counts from the store
fn handle_stats(config: &dealsweep::config::Config) -> anyhow::Result<()> {
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))
        .context("failed to open deal store")?;

    println!("=== Stored Deals ===\n");
    let mut total = 0u64;
    for entry in &config.sources {
        let count = store.count_by_source(entry.source_id)?;
        total += count;
        println!(
            "  {:<16} {:>6} deals (ceiling {})",
            entry.name, count, entry.keep_count
        );
    }
    println!("\n  Total: {} deals", total);

    Ok(())
}

/// Handles the main harvest run
async fn handle_run(
    config: dealsweep::config::Config,
    only: Option<&str>,
) -> anyhow::Result<()> {
    use std::path::Path;

    // The store connection is the only fatal dependency; everything
    // after this degrades per-source
    let mut store = open_store(Path::new(&config.output.database_path))
        .context("failed to open deal store")?;

    tracing::info!(
        "Harvest starting: {} sources configured{}",
        config.sources.len(),
        only.map(|n| format!(" (restricted to '{}')", n))
            .unwrap_or_default()
    );

    let harvester = Harvester::new(config)?;
    let report = harvester.run(&mut store, only).await?;

    println!(
        "Harvest finished: {} crawled / {} saved ({} sources, {} failed)",
        report.total_crawled,
        report.total_saved,
        report.sources.len(),
        report.failed_sources()
    );

    for source in &report.sources {
        match &source.failed {
            Some(reason) => println!("  {:<16} FAILED ({})", source.name, reason),
            None => println!(
                "  {:<16} {:>4} crawled, {:>4} saved, {} duplicates, {} trimmed{}",
                source.name,
                source.crawled,
                source.saved,
                source.duplicates,
                source.trimmed,
                if source.stopped_early {
                    ", stopped at marker"
                } else {
                    ""
                }
            ),
        }
    }

    Ok(())
}
