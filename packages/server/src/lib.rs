#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web server for the penalty report application.
//!
//! On startup the `SQLite` record store is opened and, if empty, populated
//! from the dataset CSV. The server then exposes the report endpoints,
//! which filter records by month range and return either JSON rows or a
//! base64 PNG chart with summary statistics, and serves the static report
//! page.

mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use penalty_report_database::{DEFAULT_DB_PATH, DbError, open_db};
use penalty_report_ingest::{DEFAULT_CSV_PATH, IngestError, LoadOutcome, populate_if_empty};
use switchy_database::Database;

pub use handlers::ApiError;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_STATIC_DIR: &str = "app";

/// Shared application state.
pub struct AppState {
    /// Record store connection.
    pub db: Arc<dyn Database>,
}

/// Server settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Path of the `SQLite` record store.
    pub database_path: PathBuf,
    /// Dataset CSV used to populate an empty store.
    pub dataset_csv: PathBuf,
    /// Directory holding `index.html` and its assets.
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            dataset_csv: PathBuf::from(DEFAULT_CSV_PATH),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from `BIND_ADDR`, `PORT`, `DATABASE_PATH`,
    /// `DATASET_CSV` and `STATIC_DIR`, falling back to the defaults for
    /// unset variables. An unparseable `PORT` also falls back.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_path: lookup("DATABASE_PATH").map_or(defaults.database_path, PathBuf::from),
            dataset_csv: lookup("DATASET_CSV").map_or(defaults.dataset_csv, PathBuf::from),
            static_dir: lookup("STATIC_DIR").map_or(defaults.static_dir, PathBuf::from),
        }
    }
}

/// Errors that abort server startup.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Failed to load dataset: {0}")]
    Ingest(#[from] IngestError),

    #[error("HTTP server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Registers the report endpoints.
///
/// The static file service is not included; it is mounted at `/` and must
/// come after these routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/penalty_cases", web::get().to(handlers::penalty_cases))
        .route(
            "/route_for_button2",
            web::get().to(handlers::offence_code_distribution),
        )
        .route(
            "/route_for_button3",
            web::get().to(handlers::description_search),
        )
        .route("/route_for_button4", web::get().to(handlers::mobile_trend))
        .route(
            "/plot_offense_codes",
            web::get().to(handlers::offence_code_comparison),
        )
        .service(web::scope("/api").route("/health", web::get().to(handlers::health)));
}

/// Starts the penalty report server.
///
/// Opens the record store, loads the dataset if the store is empty, and
/// runs the HTTP server until it shuts down. The caller is responsible for
/// providing the async runtime (e.g. via `#[actix_web::main]`) and for
/// initializing logging.
///
/// # Errors
///
/// Returns [`ServerError`] if the store cannot be opened, the dataset
/// cannot be loaded, or the HTTP server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    log::info!("Opening record store at {}...", config.database_path.display());
    let db = open_db(&config.database_path).await?;

    match populate_if_empty(db.as_ref(), &config.dataset_csv).await? {
        LoadOutcome::Loaded { records } => log::info!("Loaded {records} records"),
        LoadOutcome::Skipped { existing } => log::info!("Serving {existing} existing records"),
    }

    let state = web::Data::new(AppState {
        db: Arc::from(db),
    });
    let static_dir = config.static_dir.clone();

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
            // Serve the report page
            .service(Files::new("/", &static_dir).index_file("index.html"))
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn unset_variables_use_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 5000);
        assert_eq!(config.database_path, PathBuf::from("data/data.db"));
        assert_eq!(config.dataset_csv, PathBuf::from("data/dataSet.csv"));
    }

    #[test]
    fn reads_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("BIND_ADDR", "0.0.0.0"),
            ("PORT", "8080"),
            ("DATABASE_PATH", "/tmp/report.db"),
            ("STATIC_DIR", "public"),
        ]));

        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, PathBuf::from("/tmp/report.db"));
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert_eq!(config.dataset_csv, PathBuf::from(DEFAULT_CSV_PATH));
    }

    #[test]
    fn invalid_port_falls_back() {
        let config = ServerConfig::from_lookup(lookup(&[("PORT", "http")]));
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
