//! cachemaps - fetch static cache maps and inspect offline vector maps.
//!
//! A small front end over `cachemaps-core`: it reads a geocache as JSON,
//! drives the static tile pipeline for the cache and its waypoints, and
//! lists the offline map sources with their attribution.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cachemaps_core::downloader::EnsureOutcome;
use cachemaps_core::models::{DisplaySize, Geocache, Subject};
use cachemaps_core::utils::truncate_string;
use cachemaps_core::{
    Config, HttpTileClient, MapFileStore, MapValidityCache, MarkerIcons, OfflineMapCatalog,
    OfflineMapRegistry, StaticMapDownloader, TileFetchScheduler,
};

// ============================================================================
// Constants
// ============================================================================

/// Longest attribution line printed by `maps`
const MAX_ATTRIBUTION_WIDTH: usize = 100;

#[derive(Parser)]
#[command(name = "cachemaps", version, about = "Static cache maps and offline map sources")]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the static maps for a cache and its waypoints
    Fetch {
        /// Geocache JSON file
        cache: PathBuf,
        /// Display width in pixels
        #[arg(long, default_value_t = 720)]
        width: u32,
        /// Display height in pixels
        #[arg(long, default_value_t = 1280)]
        height: u32,
        /// Queue the downloads on the background worker
        #[arg(long)]
        background: bool,
    },
    /// Delete the static maps for a cache and its waypoints
    Remove {
        /// Geocache JSON file
        cache: PathBuf,
    },
    /// Show which subjects of a cache have static maps
    Status {
        /// Geocache JSON file
        cache: PathBuf,
    },
    /// Rescan the offline maps folder and list the sources
    Maps,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // RUST_LOG wins over -v
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Log file has no name: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env();
    Ok(config)
}

fn read_cache(path: &Path) -> Result<Geocache> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut cache: Geocache = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid geocache JSON in {}", path.display()))?;
    cache.link_waypoints();
    Ok(cache)
}

fn subjects(cache: &Geocache) -> Vec<Subject<'_>> {
    std::iter::once(Subject::Cache(cache))
        .chain(cache.waypoints.iter().map(Subject::Waypoint))
        .collect()
}

fn describe(outcome: &EnsureOutcome) -> String {
    match outcome {
        EnsureOutcome::Skipped => "skipped (no coordinates)".to_string(),
        EnsureOutcome::Downloaded(summary) if summary.aborted => {
            "aborted (cannot write map folder)".to_string()
        }
        EnsureOutcome::Downloaded(summary) => format!(
            "{} stored, {} without imagery, {} failed",
            summary.stored, summary.unavailable, summary.failed
        ),
        EnsureOutcome::Queued => "queued".to_string(),
        EnsureOutcome::Dropped(e) => format!("dropped ({})", e),
    }
}

/// Wire the tile pipeline from the config. Needs a running Tokio runtime.
fn build_downloader(
    config: &Config,
) -> Result<(StaticMapDownloader<HttpTileClient>, Arc<TileFetchScheduler>)> {
    let client = HttpTileClient::new(
        &config.static_map_url,
        config.api_key.clone(),
        config.request_timeout(),
    )?;
    let store = MapFileStore::new(config.data_dir()?);
    let scheduler = Arc::new(TileFetchScheduler::start(config.queue_capacity));
    let downloader = StaticMapDownloader::new(
        Arc::new(client),
        Arc::new(store),
        Arc::clone(&scheduler),
        MarkerIcons::new(config.marker_icon_base_url.clone()),
    )
    .with_submit_timeout(config.submit_timeout());
    Ok((downloader, scheduler))
}

async fn fetch(config: &Config, cache: &Geocache, display: DisplaySize, background: bool) -> Result<()> {
    let (downloader, scheduler) = build_downloader(config)?;

    let outcomes = downloader
        .ensure_maps_for_cache(cache, display, !background)
        .await;

    if background {
        println!("Waiting for background downloads...");
        scheduler.flush(config.submit_timeout()).await?;
    }

    for (subject, outcome) in subjects(cache).iter().zip(&outcomes) {
        let present = if downloader.exists_for(*subject) { "maps present" } else { "no maps" };
        println!("{:<24} {} - {}", subject.to_string(), describe(outcome), present);
    }
    Ok(())
}

fn remove(config: &Config, cache: &Geocache) -> Result<()> {
    let (downloader, _) = build_downloader(config)?;
    let removed = downloader.remove_for_cache(cache);
    println!("Removed {} map files for {}", removed, cache.geocode);
    Ok(())
}

fn status(config: &Config, cache: &Geocache) -> Result<()> {
    let (downloader, _) = build_downloader(config)?;
    for subject in subjects(cache) {
        println!(
            "{:<24} {:<30} {}",
            subject.to_string(),
            truncate_string(subject.display_name(), 30),
            if downloader.exists_for(subject) { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn maps(config: &Config) -> Result<()> {
    let registry = OfflineMapRegistry::new(config.offline_maps_dir()?);
    let catalog = OfflineMapCatalog::new(registry, Arc::new(MapValidityCache::new()));

    let sources = catalog.refresh();
    if sources.is_empty() {
        println!("No usable offline maps in {}", catalog.registry().dir().display());
        return Ok(());
    }

    for source in &sources {
        let state = if source.is_available() { "available" } else { "unavailable" };
        println!("{} [{}]", source.name(), state);
        if let Some(attribution) = source.attribution() {
            for line in attribution.lines() {
                println!("    {}", truncate_string(line, MAX_ATTRIBUTION_WIDTH));
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.verbose, cli.log_file.as_deref())?;
    info!("cachemaps starting");

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Fetch {
            cache,
            width,
            height,
            background,
        } => {
            let cache = read_cache(&cache)?;
            fetch(&config, &cache, DisplaySize { width, height }, background).await
        }
        Command::Remove { cache } => remove(&config, &read_cache(&cache)?),
        Command::Status { cache } => status(&config, &read_cache(&cache)?),
        Command::Maps => maps(&config),
    }
}
