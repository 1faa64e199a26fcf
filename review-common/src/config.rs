//! Configuration loading for the review validator
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments
//! 2. Environment variables (`DATABRICKS_*`, `REVIEW_*`, legacy `DB_HOST`/`DB_PAT`)
//! 3. TOML configuration file
//! 4. Built-in defaults
//!
//! The binary turns arguments and environment into [`ConfigOverrides`] (clap reads
//! both); [`Config::resolve`] layers those over the TOML file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::db::Tables;
use crate::error::{Error, Result};
use crate::vector::VectorSettings;
use crate::warehouse::WarehouseSettings;

/// Directory name under the platform config dir
pub const APP_DIR: &str = "review-validator";

pub const DEFAULT_EVALUATION_MODEL: &str = "human_validation_v1_legacy";
pub const DEFAULT_SOURCE_TABLE: &str = "main.default.guest_sentiment_scores";
pub const DEFAULT_EMBEDDING_ENDPOINT: &str = "databricks-gte-large-en";

/// TOML configuration file contents
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub warehouse: WarehouseConfig,
    pub vector_search: VectorSearchConfig,
    pub review: ReviewConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
    /// Built frontend served at `/` when present
    pub frontend_dir: Option<PathBuf>,
    /// Allowed CORS origins; an empty list allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            frontend_dir: None,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

/// Which warehouse implementation to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseBackend {
    Databricks,
    Sqlite,
}

impl std::str::FromStr for WarehouseBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "databricks" => Ok(Self::Databricks),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::Config(format!("Unknown warehouse backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub backend: WarehouseBackend,
    pub host: Option<String>,
    pub token: Option<String>,
    pub warehouse_id: Option<String>,
    /// SQLite database file; in-memory when unset
    pub sqlite_path: Option<PathBuf>,
    pub source_table: String,
    /// Defaults to `<source_table>_evaluation`
    pub evaluation_table: Option<String>,
    pub timeout_secs: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            backend: WarehouseBackend::Databricks,
            host: None,
            token: None,
            warehouse_id: None,
            sqlite_path: None,
            source_table: DEFAULT_SOURCE_TABLE.to_string(),
            evaluation_table: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VectorSearchConfig {
    pub enabled: bool,
    pub index_name: Option<String>,
    pub embedding_endpoint: String,
}

impl Default for VectorSearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            index_name: None,
            embedding_endpoint: DEFAULT_EMBEDDING_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Version tag written with every evaluation row
    pub evaluation_model: String,
    pub recommendations_enabled: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            evaluation_model: DEFAULT_EVALUATION_MODEL.to_string(),
            recommendations_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub frontend_dir: Option<PathBuf>,
    pub backend: Option<WarehouseBackend>,
    pub host: Option<String>,
    pub token: Option<String>,
    pub warehouse_id: Option<String>,
    pub sqlite_path: Option<PathBuf>,
    pub source_table: Option<String>,
    pub evaluation_table: Option<String>,
    pub vector_enabled: Option<bool>,
    pub vector_index_name: Option<String>,
    pub embedding_endpoint: Option<String>,
    pub evaluation_model: Option<String>,
    pub recommendations_enabled: Option<bool>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    /// Fill host and token from the legacy `DB_HOST` / `DB_PAT` variables when unset
    pub fn with_legacy_env(mut self) -> Self {
        if self.host.is_none() {
            self.host = non_empty_env("DB_HOST");
        }
        if self.token.is_none() {
            self.token = non_empty_env("DB_PAT");
        }
        self
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Load the TOML file
///
/// An explicit path must exist. The default location is optional: when it is missing
/// the built-in defaults are used and a warning is logged.
pub fn load_toml(explicit: Option<&Path>) -> Result<TomlConfig> {
    let (path, required) = match explicit {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path() {
            Some(p) => (p, false),
            None => {
                warn!("No platform config directory; using built-in defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    if !path.exists() {
        if required {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        warn!(
            "Config file {} not found; using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let text = std::fs::read_to_string(&path)?;
    let config: TomlConfig = toml::from_str(&text)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolved warehouse connection
#[derive(Debug, Clone)]
pub enum WarehouseTarget {
    Databricks(WarehouseSettings),
    /// `None` means a private in-memory database
    Sqlite(Option<PathBuf>),
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub frontend_dir: Option<PathBuf>,
    pub cors_origins: Vec<String>,
    pub warehouse: WarehouseTarget,
    pub tables: Tables,
    pub vector: Option<VectorSettings>,
    pub evaluation_model: String,
    pub recommendations_enabled: bool,
    pub log_level: String,
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("{} is required for the databricks backend", what)))
}

impl Config {
    /// Layer overrides over the file
    pub fn resolve(file: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        let TomlConfig {
            server,
            warehouse,
            vector_search,
            review,
            logging,
        } = file;

        let source_table = overrides.source_table.unwrap_or(warehouse.source_table);
        let evaluation_table = overrides
            .evaluation_table
            .or(warehouse.evaluation_table)
            .unwrap_or_else(|| format!("{}_evaluation", source_table));
        let tables = Tables::new(&source_table, &evaluation_table)?;

        let host = overrides.host.or(warehouse.host);
        let token = overrides.token.or(warehouse.token);
        let timeout = Duration::from_secs(warehouse.timeout_secs.max(1));

        let backend = overrides.backend.unwrap_or(warehouse.backend);
        let target = match backend {
            WarehouseBackend::Databricks => WarehouseTarget::Databricks(WarehouseSettings {
                host: required(host.clone(), "DATABRICKS_HOST")?,
                token: required(token.clone(), "DATABRICKS_TOKEN")?,
                warehouse_id: required(
                    overrides.warehouse_id.or(warehouse.warehouse_id),
                    "DATABRICKS_WAREHOUSE_ID",
                )?,
                timeout,
            }),
            WarehouseBackend::Sqlite => {
                WarehouseTarget::Sqlite(overrides.sqlite_path.or(warehouse.sqlite_path))
            }
        };

        let vector_enabled = overrides.vector_enabled.unwrap_or(vector_search.enabled);
        let vector = if vector_enabled {
            let (Some(host), Some(token)) = (host, token) else {
                return Err(Error::Config(
                    "vector search needs a Databricks host and token".to_string(),
                ));
            };
            let index_name = overrides
                .vector_index_name
                .or(vector_search.index_name)
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| {
                    Error::Config("VECTOR_INDEX_NAME is required when vector search is enabled".to_string())
                })?;
            Some(VectorSettings {
                host,
                token,
                index_name,
                embedding_endpoint: overrides
                    .embedding_endpoint
                    .unwrap_or(vector_search.embedding_endpoint),
                timeout,
            })
        } else {
            None
        };

        Ok(Self {
            bind: overrides.bind.unwrap_or(server.bind),
            frontend_dir: overrides.frontend_dir.or(server.frontend_dir),
            cors_origins: server.cors_origins,
            warehouse: target,
            tables,
            vector,
            evaluation_model: overrides.evaluation_model.unwrap_or(review.evaluation_model),
            recommendations_enabled: overrides
                .recommendations_enabled
                .unwrap_or(review.recommendations_enabled),
            log_level: overrides.log_level.unwrap_or(logging.level),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_overrides() -> ConfigOverrides {
        ConfigOverrides {
            backend: Some(WarehouseBackend::Sqlite),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(TomlConfig::default(), sqlite_overrides()).unwrap();
        assert_eq!(config.bind, "0.0.0.0:8000");
        assert_eq!(config.evaluation_model, "human_validation_v1_legacy");
        assert!(!config.recommendations_enabled);
        assert!(config.vector.is_none());
        assert_eq!(config.tables.source(), DEFAULT_SOURCE_TABLE);
        assert_eq!(
            config.tables.evaluation(),
            format!("{}_evaluation", DEFAULT_SOURCE_TABLE)
        );
        assert!(matches!(config.warehouse, WarehouseTarget::Sqlite(None)));
    }

    #[test]
    fn test_databricks_requires_warehouse_id() {
        let overrides = ConfigOverrides {
            host: Some("adb-1.azuredatabricks.net".into()),
            token: Some("dapi".into()),
            ..Default::default()
        };
        let err = Config::resolve(TomlConfig::default(), overrides).unwrap_err();
        assert!(err.to_string().contains("DATABRICKS_WAREHOUSE_ID"));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file: TomlConfig = toml::from_str(
            r#"
            [warehouse]
            backend = "sqlite"
            source_table = "file_source"
            evaluation_table = "file_eval"

            [review]
            recommendations_enabled = true
            "#,
        )
        .unwrap();
        let overrides = ConfigOverrides {
            source_table: Some("cli_source".into()),
            recommendations_enabled: Some(false),
            ..Default::default()
        };
        let config = Config::resolve(file, overrides).unwrap();
        assert_eq!(config.tables.source(), "cli_source");
        assert_eq!(config.tables.evaluation(), "file_eval");
        assert!(!config.recommendations_enabled);
    }

    #[test]
    fn test_invalid_table_name_rejected() {
        let overrides = ConfigOverrides {
            source_table: Some("x; DROP TABLE y".into()),
            ..sqlite_overrides()
        };
        assert!(Config::resolve(TomlConfig::default(), overrides).is_err());
    }

    #[test]
    fn test_vector_search_needs_index() {
        let overrides = ConfigOverrides {
            host: Some("h".into()),
            token: Some("t".into()),
            vector_enabled: Some(true),
            ..sqlite_overrides()
        };
        assert!(Config::resolve(TomlConfig::default(), overrides.clone()).is_err());

        let overrides = ConfigOverrides {
            vector_index_name: Some("main.ge.review_index".into()),
            ..overrides
        };
        let config = Config::resolve(TomlConfig::default(), overrides).unwrap();
        let vector = config.vector.unwrap();
        assert_eq!(vector.embedding_endpoint, DEFAULT_EMBEDDING_ENDPOINT);
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("SQLite".parse::<WarehouseBackend>().unwrap(), WarehouseBackend::Sqlite);
        assert!("oracle".parse::<WarehouseBackend>().is_err());
    }
}
