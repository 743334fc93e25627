/// tapwater_service: HTTP service for ZIP water quality reports.
///
/// Startup order:
///   1. Load `tapwater.toml` (or `$TAPWATER_CONFIG`), defaults if absent
///   2. Initialize logging
///   3. Open the store: fixture file if configured, PostgreSQL otherwise
///   4. Serve `/api/{zip}` and `/explore/{zip}`
///
/// The store handle is built once here and shared with every request.

use std::process::ExitCode;
use std::sync::Arc;

use tapwater_service::api::{self, AppState};
use tapwater_service::config::Config;
use tapwater_service::db::{PgStore, REQUIRED_TABLES};
use tapwater_service::fixture;
use tapwater_service::logging::{self, Component};
use tapwater_service::store::WaterQualityStore;

fn main() -> ExitCode {
    let config = match Config::load_or_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logger(
        config.log_level(),
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );

    let store = match open_store(&config) {
        Ok(store) => store,
        Err(e) => {
            logging::error(Component::System, None, &format!("Store unavailable: {}", e));
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            logging::error(Component::System, None, &format!("Failed to start runtime: {}", e));
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(store, config.cache.clone());
    match runtime.block_on(serve(&config.server.bind, state)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(Component::System, None, &format!("Server error: {}", e));
            ExitCode::FAILURE
        }
    }
}

/// Opens the configured store. Runs before the async runtime exists because
/// the PostgreSQL client is blocking.
fn open_store(config: &Config) -> Result<Arc<dyn WaterQualityStore>, Box<dyn std::error::Error>> {
    if let Some(path) = &config.database.fixture {
        logging::info(Component::System, None, &format!("Serving fixture data from {}", path));
        return Ok(Arc::new(fixture::load_fixture(path)?));
    }

    let url = config.database_url()?;
    let store = PgStore::connect_and_verify(&url, REQUIRED_TABLES)?;
    logging::info(Component::Database, None, "Connected to PostgreSQL");
    Ok(Arc::new(store))
}

async fn serve(bind: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    logging::info(
        Component::System,
        None,
        &format!("Listening on http://{}", listener.local_addr()?),
    );
    axum::serve(listener, api::router(state)).await
}
