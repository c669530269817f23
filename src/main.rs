use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tft_meta::api::state::AppState;
use tft_meta::config::AppConfig;
use tft_meta::fetch::Fetcher;
use tft_meta::parse_duration;
use tft_meta::pipeline::RefreshJob;
use tft_meta::rate_limit::RateLimiterRegistry;
use tft_meta::riot::RiotClient;
use tft_meta::storage::{FileStore, StatsStore, StorageConfig};

#[derive(Parser)]
#[command(name = "tft-meta")]
#[command(about = "TeamFight Tactics match aggregation pipeline and stats API")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, aggregate and store match statistics
    Refresh {
        /// Run one refresh and exit
        #[arg(long)]
        once: bool,

        /// Run continuously at interval
        #[arg(long)]
        watch: bool,

        /// Refresh interval (e.g., "6h", "30m")
        #[arg(long, default_value = "6h")]
        interval: String,
    },

    /// Start the API server
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port number (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Remove raw matches older than the retention window
    Cleanup {
        /// Retention in days (defaults to the pipeline setting)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Print the last recorded status of every region
    Status,
}

/// Config file if present, defaults otherwise; CLI flags win.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = if cli.config.exists() {
        AppConfig::from_file(&cli.config)
            .with_context(|| format!("Failed to load {}", cli.config.display()))?
    } else {
        AppConfig::default()
    };

    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_job(config: &AppConfig, store: Arc<FileStore>) -> Result<Arc<RefreshJob>> {
    let api_key = config
        .riot
        .api_key()
        .context("A Riot API key is required to refresh")?;

    let limits = Arc::new(RateLimiterRegistry::new(config.rate_limits.clone()));
    let fetcher = Fetcher::with_api_key(&api_key, limits, config.riot.fetcher_config())?;
    let client = RiotClient::with_host(fetcher, &config.riot.scheme, &config.riot.api_host);

    Ok(Arc::new(RefreshJob::new(
        Arc::new(client),
        store,
        config.pipeline.clone(),
    )))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_tracing(&config.log_level, cli.json_logs);
    tracing::info!("Starting tft-meta v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(FileStore::new(StorageConfig::new(config.data_dir.clone())));

    match cli.command {
        Commands::Refresh {
            once,
            watch,
            interval: interval_str,
        } => {
            let job = build_job(&config, store)?;

            if once {
                tracing::info!("Running one-time refresh...");
                let summary = job.run().await;
                println!("\n=== Refresh Results ===");
                println!("Success:           {}", summary.success);
                println!("Matches:           {}", summary.match_count);
                println!("Regions processed: {}", summary.regions_processed);
            } else if watch {
                let every = parse_duration(&interval_str)
                    .filter(|d| !d.is_zero())
                    .unwrap_or(Duration::from_secs(6 * 3600));
                tracing::info!("Starting periodic refresh every {:?}", every);

                let mut ticker = tokio::time::interval(every);
                loop {
                    ticker.tick().await;
                    let summary = job.run().await;
                    if summary.success {
                        tracing::info!(
                            "Periodic refresh completed: {} matches from {} regions",
                            summary.match_count,
                            summary.regions_processed
                        );
                    } else {
                        tracing::error!("Periodic refresh failed: {:?}", summary);
                    }
                }
            } else {
                eprintln!("Specify --once or --watch");
            }
        }
        Commands::Serve { host, port } => {
            let job = build_job(&config, store.clone())?;
            let cron_secret = match config.server.cron_secret() {
                Ok(secret) => Some(secret),
                Err(e) => {
                    tracing::warn!("{}; cron refresh is disabled", e);
                    None
                }
            };

            let state = AppState::new(store, job, cron_secret, &config.server);
            let app = tft_meta::api::build_router(state);

            let addr = format!(
                "{}:{}",
                host.unwrap_or_else(|| config.server.host.clone()),
                port.unwrap_or(config.server.port)
            );
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            tracing::info!("API listening on http://{}", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        Commands::Cleanup { days } => {
            let days = days.unwrap_or(config.pipeline.retention_days);
            let removed = store.cleanup_old_data(days).await?;
            println!("Removed {} files older than {} days", removed, days);
        }
        Commands::Status => {
            let statuses = store.region_statuses().await?;
            if statuses.is_empty() {
                println!("No region status recorded yet");
            }
            for status in statuses {
                println!(
                    "{:<6} {:<9} {:>4} matches  {}  {}",
                    status.region.as_str(),
                    format!("{:?}", status.status).to_lowercase(),
                    status.match_count,
                    status.updated_at.format("%Y-%m-%d %H:%M:%S"),
                    status.reason.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
