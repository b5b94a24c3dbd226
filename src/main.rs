//! Card Resolver - resolve, import and repair trading-card records
//!
//! Runs one-off commands against the catalogs or serves the resolve API with
//! the quota monitor running alongside.

use card_resolver::cache::{CacheTier, MemoryCache};
use card_resolver::catalog::{PriceTrackerClient, TcgApiClient};
use card_resolver::models::parse_native_id;
use card_resolver::quota::{QuotaGate, QuotaMonitor};
use card_resolver::store::{MemoryStore, PersistentStore, SqliteStore};
use card_resolver::{Collaborators, Config, ResolutionService, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How often expired cache entries are swept while serving
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Trading card resolver - tiered lookups with cross-catalog enrichment
#[derive(Parser, Debug)]
#[command(name = "card_resolver")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, default_value_t = default_db_path())]
    database: String,

    /// Keep records in memory instead of SQLite
    #[arg(long, default_value_t = false)]
    memory_store: bool,

    /// Disable the cache tier
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a card (`ppt-73092`, `card-73092` or `73092`)
    Resolve {
        id: String,
        /// Set id of the card, enables the store lookup
        #[arg(long)]
        set_id: Option<i64>,
        /// Bypass cache and store
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Resolve a set
    ResolveSet {
        id: String,
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Import, enrich and save every card of a set
    ImportSet { set_id: i64 },
    /// Find missing imagery for stored cards of a set (allows loose matches)
    RepairImages { set_id: i64 },
    /// Check the price tracker credit quota
    Quota {
        /// Check once and exit (default: keep checking on the configured interval)
        #[arg(long, default_value_t = false)]
        once: bool,
    },
    /// Serve the resolve API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Don't run the quota monitor alongside the API
        #[arg(long, default_value_t = false)]
        no_monitor: bool,
    },
}

/// Returns the default database path: ~/.local/share/card_resolver/records.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("card_resolver")
        .join("records.db")
        .to_string_lossy()
        .to_string()
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::from_env();

    if let Err(e) = run(args, config).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args, config: Config) -> Result<()> {
    let price_tracker = Arc::new(PriceTrackerClient::new(
        &config.price_tracker_base,
        config.price_tracker_api_key.clone(),
        config.catalog_timeout,
    )?);
    let tcg_api = Arc::new(TcgApiClient::new(
        &config.tcg_api_base,
        config.tcg_api_key.clone(),
        config.catalog_timeout,
    )?);
    let gate = Arc::new(QuotaGate::new());
    let monitor = Arc::new(QuotaMonitor::new(
        price_tracker.clone(),
        Arc::clone(&gate),
        config.assumed_monthly_credits,
        config.catalog_timeout,
    ));

    // The quota command needs neither cache nor store
    if let Command::Quota { once } = args.command {
        if once {
            print_json(&monitor.sample().await?);
        } else {
            monitor.run(config.quota_interval).await;
        }
        return Ok(());
    }

    let cache = if config.cache_enabled && !args.no_cache {
        Some(Arc::new(MemoryCache::new()))
    } else {
        log::info!("Cache tier disabled");
        None
    };
    let store = open_store(&args)?;

    let service = Arc::new(ResolutionService::new(
        Collaborators {
            cache: cache.clone().map(|c| c as Arc<dyn CacheTier>),
            store,
            primary: price_tracker,
            secondary: tcg_api,
            gate,
        },
        &config,
    ));

    match args.command {
        Command::Resolve {
            id,
            set_id,
            refresh,
        } => {
            let native_id = parse_native_id(&id)?;
            print_json(&service.resolve_card_response(native_id, set_id, refresh).await);
        }
        Command::ResolveSet { id, refresh } => {
            let native_id = parse_native_id(&id)?;
            print_json(&service.resolve_set_response(native_id, refresh).await);
        }
        Command::ImportSet { set_id } => {
            print_json(&service.import_set(set_id).await?);
        }
        Command::RepairImages { set_id } => {
            print_json(&service.repair_imagery(set_id).await?);
        }
        Command::Serve { port, no_monitor } => {
            let monitor = if no_monitor {
                None
            } else {
                tokio::spawn(Arc::clone(&monitor).run(config.quota_interval));
                Some(monitor)
            };
            if let Some(cache) = cache {
                tokio::spawn(sweep_cache(cache));
            }

            tokio::select! {
                result = card_resolver::web::serve(service, monitor, port) => {
                    if let Err(e) = result {
                        log::error!("Web server error: {}", e);
                        std::process::exit(1);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Shutting down");
                }
            }
        }
        Command::Quota { .. } => {}
    }

    Ok(())
}

fn open_store(args: &Args) -> Result<Arc<dyn PersistentStore>> {
    if args.memory_store {
        log::info!("Using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db_path = PathBuf::from(&args.database);
    log::info!("Database path: {}", db_path.display());

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                card_resolver::ResolverError::Persistence(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
            log::info!("Created directory: {}", parent.display());
        }
    }

    Ok(Arc::new(SqliteStore::open(&db_path)?))
}

async fn sweep_cache(cache: Arc<MemoryCache>) {
    let mut ticker = tokio::time::interval(CACHE_SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        let removed = cache.purge_expired().await;
        if removed > 0 {
            log::debug!("Swept {} expired cache entries", removed);
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to serialize output: {}", e),
    }
}
