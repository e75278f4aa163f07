//! worldcat-holdings - WorldCat library holdings pipeline
//!
//! Gathers holding libraries for every title in the catalog, reconciles the
//! WorldCat metadata against it, and summarizes holdings by country and region.
//!
//! ## Usage
//!
//! ### Gather holdings
//! ```bash
//! WORLDCAT_WSKEY=... worldcat-holdings gather
//! ```
//!
//! ### Build the results CSV
//! ```bash
//! worldcat-holdings report
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;
use worldcat_holdings::cache::{RequestCache, DEFAULT_CACHE_FILE};
use worldcat_holdings::catalog::{TitleCatalog, TrickyTitles};
use worldcat_holdings::client::{ClientConfig, WorldCatClient, DEFAULT_BASE_URL};
use worldcat_holdings::pipeline::{self, DEFAULT_LAST_RECORD};
use worldcat_holdings::regions::{self, DEFAULT_REGIONS_URL};
use worldcat_holdings::report;

const TITLE_RECORDS_FILE: &str = "neh_title_records.json";
const TRICKY_TITLES_FILE: &str = "tricky_titles.csv";
const STATS_FILE: &str = "worldcat_stats.json";
const RESULTS_FILE: &str = "worldcat_analysis_results.csv";

// ============================================================================
// CLI Definition
// ============================================================================

/// WorldCat library holdings pipeline
#[derive(Parser)]
#[command(name = "worldcat-holdings")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Request cache file
    #[arg(long, global = true, default_value = DEFAULT_CACHE_FILE)]
    cache: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Input and output locations shared by `gather` and `report`
#[derive(clap::Args)]
struct PathArgs {
    /// Directory holding the title records JSON and tricky titles CSV
    #[arg(long, default_value = "inputs")]
    inputs: PathBuf,

    /// Directory for the stats JSON and results CSV
    #[arg(long, default_value = "outputs")]
    outputs: PathBuf,

    /// Number of catalog records to process
    #[arg(long, default_value_t = DEFAULT_LAST_RECORD)]
    last_record: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect holdings from WorldCat and write the stats JSON
    Gather {
        /// WorldCat Search API key
        #[arg(long, env = "WORLDCAT_WSKEY", hide_env_values = true)]
        wskey: String,

        #[command(flatten)]
        paths: PathArgs,

        /// WorldCat service root
        #[arg(long, default_value = DEFAULT_BASE_URL, value_parser = parse_url)]
        base_url: Url,

        /// Page listing countries by regional classification
        #[arg(long, default_value = DEFAULT_REGIONS_URL, value_parser = parse_url)]
        regions_url: Url,

        /// Request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },

    /// Build the results CSV from gathered stats
    Report {
        #[command(flatten)]
        paths: PathArgs,
    },

    /// Manage the request cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache file path
    Path,
    /// Delete all cached responses
    Clear,
    /// Show number of cached responses
    Stats,
}

fn parse_url(value: &str) -> std::result::Result<Url, url::ParseError> {
    Url::parse(value)
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Gather {
            wskey,
            paths,
            base_url,
            regions_url,
            timeout,
        } => {
            let config = ClientConfig {
                wskey,
                base_url: base_url.to_string(),
                timeout: Duration::from_secs(timeout),
            };
            run_gather(config, &cli.cache, &paths, regions_url.as_str()).await
        }
        Commands::Report { paths } => run_report(&paths),
        Commands::Cache { action } => handle_cache(action, &cli.cache),
    }
}

// ============================================================================
// Gather
// ============================================================================

fn load_inputs(paths: &PathArgs) -> Result<(TitleCatalog, TrickyTitles)> {
    let records_path = paths.inputs.join(TITLE_RECORDS_FILE);
    let catalog = TitleCatalog::load(&records_path)
        .with_context(|| format!("Failed to load title records from {:?}", records_path))?;

    let tricky_path = paths.inputs.join(TRICKY_TITLES_FILE);
    let tricky = TrickyTitles::load(&tricky_path)
        .with_context(|| format!("Failed to load tricky titles from {:?}", tricky_path))?;

    Ok((catalog, tricky))
}

async fn run_gather(config: ClientConfig, cache_path: &Path, paths: &PathArgs, regions_url: &str) -> Result<()> {
    let (catalog, tricky) = load_inputs(paths)?;
    println!(
        "Loaded {} title records and {} tricky titles",
        catalog.len(),
        tricky.len()
    );

    let cache = RequestCache::load(cache_path);
    println!("Cache: {} responses in {:?}", cache.len(), cache.path());

    let mut client = WorldCatClient::new(config, cache).context("Failed to create WorldCat client")?;

    let region_table = regions::fetch_region_table(&mut client, regions_url)
        .await
        .context("Failed to load region table")?;
    info!(countries = region_table.len(), "Loaded region table");

    println!("\n--- Gathering holdings (first {} records) ---", paths.last_record);
    let report = pipeline::gather(&mut client, &catalog, &tricky, &region_table, paths.last_record).await;

    let stats_path = paths.outputs.join(STATS_FILE);
    pipeline::write_stats(&stats_path, &report.stats)
        .with_context(|| format!("Failed to write {:?}", stats_path))?;
    println!("Saved: {:?}", stats_path);

    println!("\n--- Summary ---");
    println!("Titles gathered: {}", report.stats.len());
    println!("Match issues: {}", report.match_issues.len());
    if !report.match_issues.is_empty() {
        println!("  {}", report.match_issues.join(", "));
    }
    println!("No records found: {}", report.no_records_found.len());
    if !report.no_records_found.is_empty() {
        println!("  {}", report.no_records_found.join(", "));
    }
    if !report.failed.is_empty() {
        println!("Failed: {}", report.failed.join(", "));
    }
    if report.stopped_at_api_limit {
        println!("Stopped at the API limit; run again later to continue from the cache.");
    }

    Ok(())
}

// ============================================================================
// Report
// ============================================================================

fn run_report(paths: &PathArgs) -> Result<()> {
    let (catalog, tricky) = load_inputs(paths)?;

    let stats_path = paths.outputs.join(STATS_FILE);
    let stats = pipeline::read_stats(&stats_path)
        .with_context(|| format!("Failed to read {:?}; run gather first", stats_path))?;

    let rows = report::build_rows(&catalog, &tricky, &stats, paths.last_record);
    if rows.is_empty() {
        println!("No data to save.");
        return Ok(());
    }

    let results_path = paths.outputs.join(RESULTS_FILE);
    report::save_results_csv(&results_path, &rows).context("Failed to write results CSV")?;
    println!("Saved: {:?} ({} rows)", results_path, rows.len());
    Ok(())
}

// ============================================================================
// Cache Management
// ============================================================================

fn handle_cache(action: CacheAction, cache_path: &Path) -> Result<()> {
    let mut cache = RequestCache::load(cache_path);

    match action {
        CacheAction::Path => {
            println!("Cache file: {:?}", cache.path());
        }
        CacheAction::Clear => {
            cache.clear().context("Failed to clear cache")?;
            println!("Cache cleared.");
        }
        CacheAction::Stats => {
            let (json, text) = cache.stats();
            println!("Cache file: {:?}", cache.path());
            println!("Responses: {} ({} JSON, {} text)", cache.len(), json, text);
        }
    }

    Ok(())
}
