use std::sync::Arc;

use clap::Parser;
use log::{info, warn, LevelFilter};

use gridstore_core::configuration::Configuration;
use gridstore_core::storage::Store;

mod error;
mod extract;
mod routes;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub token_secret: Arc<String>,
}

#[derive(Parser, Debug)]
#[command(name = "gridstore_server", version, about = "Gridstore HTTP Server")]
struct Args {
    /// Listen address (default: 127.0.0.1:8080)
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,

    /// Database file path (default: gridstore.db in the working directory)
    #[arg(long, value_name = "PATH")]
    location: Option<String>,

    /// Connection pool size (default: 10)
    #[arg(long = "pool-size", alias = "pool_size", value_name = "N")]
    pool_size: Option<usize>,

    /// Token signing secret (overrides GRIDSTORE_TOKEN_SECRET)
    #[arg(long = "token-secret", alias = "token_secret", value_name = "SECRET")]
    token_secret: Option<String>,

    /// Comma-separated field names probed case-insensitively by free-text
    /// search (overrides GRIDSTORE_SEARCH_FIELDS)
    #[arg(long = "search-fields", alias = "search_fields", value_name = "FIELDS")]
    search_fields: Option<String>,

    /// Logging level off, error, warn, info, debug, trace (default: info)
    #[arg(long = "log-level", alias = "log_level", value_name = "LEVEL")]
    log_level: Option<LevelFilter>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    let level = args.log_level.unwrap_or(LevelFilter::Info);
    env_logger::Builder::new().filter_level(level).init();

    let mut config = Configuration::from_env();
    if args.location.is_some() {
        config.location = args.location.clone();
    }
    if args.pool_size.is_some() {
        config.pool_size = args.pool_size;
    }
    if let Some(fields) = &args.search_fields {
        config.search_fields = fields
            .split(',')
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
    }

    let token_secret = args
        .token_secret
        .or_else(|| config.token_secret.clone())
        .unwrap_or_else(|| {
            warn!("no token secret configured; issued tokens will not survive a restart");
            format!("{:032x}{:032x}", rand::random::<u128>(), rand::random::<u128>())
        });

    let store = match Store::open(&config) {
        Ok(store) => store,
        Err(err) => {
            log::error!("failed to open store: {}", err);
            return Err(std::io::Error::other(err.to_string()));
        }
    };

    let state = AppState {
        store,
        token_secret: Arc::new(token_secret),
    };

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    info!("listening on {}", args.addr);

    axum::serve(listener, app).await
}
