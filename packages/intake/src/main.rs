//! AII Whitelist Intake Service
//!
//! Serves `POST /api/submit-form` for the landing page signup form and
//! forwards each accepted submission to the configured Notion database.

use std::sync::Arc;

use intake::{metrics::Metrics, server, AppState, Config, NotionStore, RecordStore};
use tracing::{info, warn};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!("Starting AII intake service");

    let config = Config::load()?;
    info!(
        bind = %config.server.bind_address,
        port = config.server.port,
        notion_api = %config.notion.api_base,
        database_id = %config.notion.database_id,
        timeout_ms = config.notion.timeout_ms,
        "Configuration loaded"
    );

    let store: Option<Arc<dyn RecordStore>> = match config.notion.token.clone() {
        Some(token) => Some(Arc::new(NotionStore::new(&config.notion, token)?)),
        None => {
            warn!("No Notion token configured (set NOTION_API); submissions will be refused");
            None
        }
    };

    let state = AppState::new(store, Arc::new(Metrics::new()), &config.server.timezone);

    server::start_server(
        &config.server.bind_address,
        config.server.port,
        state,
        wait_for_shutdown_signal(),
    )
    .await?;

    info!("AII intake service stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,intake=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
