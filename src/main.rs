use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use progmetal_catalog_server::config::{AppConfig, CliConfig, FileConfig};
use progmetal_catalog_server::enrichment::SpotifyClient;
use progmetal_catalog_server::server::{run_server, ServerState};
use progmetal_catalog_server::sheets::SheetFetcher;
use progmetal_catalog_server::{SqliteCatalogStore, SqliteSyncStore, SyncManager};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the SQLite database files.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// XLSX export URL of the release spreadsheet.
    /// Falls back to the GOOGLE_SHEETS_XLSX_URL environment variable.
    #[clap(long)]
    pub sheets_xlsx_url: Option<String>,

    /// Timeout in seconds for outbound HTTP requests.
    #[clap(long, default_value_t = 30)]
    pub http_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };

    // Secrets come from the environment; the CLI only carries non-secrets.
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir,
        port: cli_args.port,
        sheets_xlsx_url: cli_args
            .sheets_xlsx_url
            .or_else(|| std::env::var("GOOGLE_SHEETS_XLSX_URL").ok()),
        spotify_client_id: std::env::var("SPOTIFY_CLIENT_ID").ok(),
        spotify_client_secret: std::env::var("SPOTIFY_CLIENT_SECRET").ok(),
        http_timeout_secs: cli_args.http_timeout_secs,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!(
        "Opening SQLite catalog database at {:?}...",
        config.catalog_db_path()
    );
    let catalog_store = Arc::new(SqliteCatalogStore::open(&config.catalog_db_path())?);

    info!("Opening SQLite sync database at {:?}...", config.sync_db_path());
    let sync_store = Arc::new(SqliteSyncStore::open(&config.sync_db_path())?);

    let fetcher = Arc::new(SheetFetcher::new(
        config.sheets_xlsx_url.clone().unwrap_or_default(),
        config.http_timeout_secs,
    )?);
    let spotify = Arc::new(SpotifyClient::new(
        config.spotify_client_id.clone().unwrap_or_default(),
        config.spotify_client_secret.clone().unwrap_or_default(),
        config.http_timeout_secs,
        config.enrichment.clone(),
    )?);

    if let Some(msg) = config.sync_config_error() {
        info!("Sync disabled until configured: {}", msg);
    }

    let sync_manager = Arc::new(SyncManager::new(
        sync_store.clone(),
        catalog_store.clone(),
        fetcher,
        spotify,
        config.sync.clone(),
        config.sync_config_error(),
    ));

    let state = ServerState {
        catalog_store,
        sync_store,
        sync_manager,
        hash: env!("GIT_HASH").to_string(),
    };

    info!("Ready to serve at port {}!", config.port);
    run_server(state, config.port).await
}
