//! review-server - Main entry point
//!
//! Resolves configuration (command line, environment, TOML file), connects the
//! warehouse and the optional vector index, and serves the HTTP API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use review_common::config::{self, Config, ConfigOverrides, WarehouseBackend, WarehouseTarget};
use review_common::db::schema;
use review_common::vector::{DatabricksVectorIndex, SimilarityIndex};
use review_common::warehouse::{DatabricksWarehouse, SqliteWarehouse, Warehouse};
use review_server::service::{ReviewService, ReviewSettings};
use review_server::{build_router, AppState};

/// Command-line arguments for review-server
#[derive(Parser, Debug)]
#[command(name = "review-server")]
#[command(about = "Review validation service for LLM sentiment annotations")]
#[command(version)]
struct Args {
    /// Config file (default: <config dir>/review-validator/config.toml)
    #[arg(short, long, env = "REVIEW_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "REVIEW_BIND")]
    bind: Option<String>,

    /// Warehouse backend: databricks or sqlite
    #[arg(long, env = "REVIEW_WAREHOUSE_BACKEND")]
    backend: Option<String>,

    /// Databricks workspace host
    #[arg(long, env = "DATABRICKS_HOST")]
    host: Option<String>,

    /// Databricks personal access token
    #[arg(long, env = "DATABRICKS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// SQL warehouse ID
    #[arg(long, env = "DATABRICKS_WAREHOUSE_ID")]
    warehouse_id: Option<String>,

    /// SQLite database file (sqlite backend)
    #[arg(long, env = "REVIEW_SQLITE_PATH")]
    sqlite_path: Option<PathBuf>,

    /// Source table with the flattened sentiment rows
    #[arg(long, env = "BACKEND_DATA_TABLE")]
    source_table: Option<String>,

    /// Evaluation table (default: <source table>_evaluation)
    #[arg(long, env = "EVALUATION_TABLE")]
    evaluation_table: Option<String>,

    /// Enable similar-review search
    #[arg(long, env = "REVIEW_VECTOR_SEARCH")]
    vector_search: Option<bool>,

    /// Vector search index name
    #[arg(long, env = "VECTOR_INDEX_NAME")]
    vector_index_name: Option<String>,

    /// Embedding model serving endpoint
    #[arg(long, env = "EMBEDDING_MODEL_ENDPOINT_NAME")]
    embedding_endpoint: Option<String>,

    /// Version tag written with each evaluation row
    #[arg(long, env = "REVIEW_EVALUATION_MODEL")]
    evaluation_model: Option<String>,

    /// Store and serve recommendations
    #[arg(long, env = "REVIEW_RECOMMENDATIONS")]
    recommendations: Option<bool>,

    /// Built frontend directory
    #[arg(long, env = "REVIEW_FRONTEND_DIR")]
    frontend_dir: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, env = "REVIEW_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> Result<ConfigOverrides> {
        let backend = self
            .backend
            .as_deref()
            .map(str::parse::<WarehouseBackend>)
            .transpose()?;

        Ok(ConfigOverrides {
            bind: self.bind.clone(),
            frontend_dir: self.frontend_dir.clone(),
            backend,
            host: self.host.clone(),
            token: self.token.clone(),
            warehouse_id: self.warehouse_id.clone(),
            sqlite_path: self.sqlite_path.clone(),
            source_table: self.source_table.clone(),
            evaluation_table: self.evaluation_table.clone(),
            vector_enabled: self.vector_search,
            vector_index_name: self.vector_index_name.clone(),
            embedding_endpoint: self.embedding_endpoint.clone(),
            evaluation_model: self.evaluation_model.clone(),
            recommendations_enabled: self.recommendations,
            log_level: self.log_level.clone(),
        }
        .with_legacy_env())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise start at info and switch to the configured level below
    let rust_log = EnvFilter::try_from_default_env().ok();
    let from_env = rust_log.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(rust_log.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting review-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let file = config::load_toml(args.config.as_deref()).context("Failed to load config file")?;
    let config =
        Config::resolve(file, args.overrides()?).context("Invalid configuration")?;

    if !from_env {
        let level = EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("Invalid log level: {}", config.log_level))?;
        filter_handle
            .reload(level)
            .context("Failed to apply log level")?;
    }

    info!(
        source = config.tables.source(),
        evaluation = config.tables.evaluation(),
        "Review tables"
    );

    let warehouse = connect_warehouse(&config).await?;
    prepare_tables(warehouse.as_ref(), &config).await;

    let index: Option<Arc<dyn SimilarityIndex>> = match config.vector.clone() {
        Some(settings) => {
            info!(index = %settings.index_name, endpoint = %settings.embedding_endpoint, "Vector search enabled");
            Some(Arc::new(
                DatabricksVectorIndex::new(settings).context("Failed to create vector client")?,
            ))
        }
        None => {
            info!("Vector search disabled");
            None
        }
    };

    let service = ReviewService::new(
        warehouse,
        index,
        config.tables.clone(),
        ReviewSettings {
            evaluation_model: config.evaluation_model.clone(),
            recommendations_enabled: config.recommendations_enabled,
        },
    );
    let state = AppState::new(service)
        .with_frontend_dir(config.frontend_dir.clone())
        .with_cors_origins(config.cors_origins.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("Listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn connect_warehouse(config: &Config) -> Result<Arc<dyn Warehouse>> {
    match &config.warehouse {
        WarehouseTarget::Databricks(settings) => {
            info!(host = %settings.host, warehouse_id = %settings.warehouse_id, "Using Databricks SQL warehouse");
            let warehouse = DatabricksWarehouse::new(settings.clone())
                .context("Failed to create Databricks client")?;
            Ok(Arc::new(warehouse))
        }
        WarehouseTarget::Sqlite(Some(path)) => {
            info!("Using SQLite warehouse at {}", path.display());
            let warehouse = SqliteWarehouse::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Arc::new(warehouse))
        }
        WarehouseTarget::Sqlite(None) => {
            warn!("Using an in-memory SQLite warehouse; data is lost on exit");
            let warehouse = SqliteWarehouse::in_memory()
                .await
                .context("Failed to open in-memory SQLite")?;
            Ok(Arc::new(warehouse))
        }
    }
}

/// Create missing tables; failures are logged and retried on the first write
async fn prepare_tables(warehouse: &dyn Warehouse, config: &Config) {
    if matches!(config.warehouse, WarehouseTarget::Sqlite(_)) {
        if let Err(e) = schema::ensure_source_table(warehouse, &config.tables).await {
            warn!(error = %e, "Could not create source table");
        }
    }

    if let Err(e) = schema::ensure_evaluation_tables(warehouse, &config.tables).await {
        warn!(error = %e, "Could not create evaluation tables at startup");
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
