//! Configuration loading from file and environment variables.

use nb_db::{DbRuntimeSettings, ExecutorSettings, TransactionMode, SQLITE_ENGINE};
use serde::Deserialize;
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Backend name. Only `sqlite3` is accepted, since the pool is SQLite.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// How long a connection waits on a locked database.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,

    /// `autocommit` or `managed`.
    #[serde(default)]
    pub transaction_mode: TransactionMode,

    /// Log every statement with its arguments.
    #[serde(default)]
    pub debug_sql: bool,
}

impl DatabaseConfig {
    pub fn runtime_settings(&self) -> DbRuntimeSettings {
        DbRuntimeSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            pool_max_size: self.pool_max_size,
        }
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            engine: self.engine.clone(),
            transaction_mode: self.transaction_mode,
            log_queries: self.debug_sql,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "nb_db::sql=info,warn").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_db_path() -> String {
    "nb.db".to_string()
}

fn default_engine() -> String {
    SQLITE_ENGINE.to_string()
}

fn default_busy_timeout_ms() -> u64 {
    DbRuntimeSettings::default().busy_timeout_ms
}

fn default_pool_max_size() -> u32 {
    DbRuntimeSettings::default().pool_max_size
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            engine: default_engine(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
            transaction_mode: TransactionMode::default(),
            debug_sql: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override held an unusable value.
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },

    /// The configured engine is not the SQLite backend the pool opens.
    #[error("unsupported database engine {0:?}; only \"sqlite3\" is available")]
    UnsupportedEngine(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `NB_DB_PATH` overrides `database.path`
/// - `NB_DB_ENGINE` overrides `database.engine`
/// - `NB_TRANSACTION_MODE` overrides `database.transaction_mode`
/// - `NB_DEBUG_SQL` overrides `database.debug_sql` (set to "true" to enable)
/// - `NB_LOG_LEVEL` overrides `logging.level`
/// - `NB_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// if an override cannot be interpreted, or if the engine is not SQLite.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path, "config file not found, using defaults");
            Config::default()
        }
        Err(e) => return Err(ConfigError::FileRead(e)),
    };

    apply_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Rejects settings the SQLite pool cannot honour.
fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.database.engine != SQLITE_ENGINE {
        return Err(ConfigError::UnsupportedEngine(config.database.engine.clone()));
    }
    Ok(())
}

fn flag(value: &str) -> bool {
    value == "true" || value == "1"
}

/// Applies the `NB_*` overrides found through `lookup`.
fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup("NB_DB_PATH") {
        config.database.path = path;
    }
    if let Some(engine) = lookup("NB_DB_ENGINE") {
        config.database.engine = engine;
    }
    if let Some(mode) = lookup("NB_TRANSACTION_MODE") {
        config.database.transaction_mode = match mode.to_ascii_lowercase().as_str() {
            "autocommit" => TransactionMode::Autocommit,
            "managed" => TransactionMode::Managed,
            _ => {
                return Err(ConfigError::InvalidEnv {
                    var: "NB_TRANSACTION_MODE",
                    value: mode,
                })
            }
        };
    }
    if let Some(debug) = lookup("NB_DEBUG_SQL") {
        config.database.debug_sql = flag(&debug);
    }
    if let Some(level) = lookup("NB_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("NB_LOG_JSON") {
        config.logging.json = flag(&json);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str().expect("utf-8 path")).expect("should load");

        assert_eq!(config.database.engine, SQLITE_ENGINE);
        assert_eq!(config.database.transaction_mode, TransactionMode::Autocommit);
        assert_eq!(config.database.pool_max_size, 8);
        assert!(!config.database.debug_sql);
    }

    #[test]
    fn file_values_fill_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().expect("should create temp file");
        writeln!(
            file,
            "[database]\npath = \"/var/lib/nb/nb.db\"\ntransaction_mode = \"managed\"\ndebug_sql = true\n\n[logging]\njson = true"
        )
        .expect("should write config");

        let config = load_config(file.path().to_str().expect("utf-8 path")).expect("should load");
        assert_eq!(config.database.path, "/var/lib/nb/nb.db");
        assert_eq!(config.database.transaction_mode, TransactionMode::Managed);
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "warn");

        let exec = config.database.executor_settings();
        assert!(exec.log_queries);
        assert_eq!(exec.transaction_mode, TransactionMode::Managed);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().expect("should create temp file");
        writeln!(file, "[database\npath = ").expect("should write config");
        let err = load_config(file.path().to_str().expect("utf-8 path")).expect_err("bad toml");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("NB_DB_PATH", ":memory:"),
            ("NB_DB_ENGINE", "postgresql_psycopg2"),
            ("NB_TRANSACTION_MODE", "Managed"),
            ("NB_DEBUG_SQL", "1"),
            ("NB_LOG_LEVEL", "nb_db::sql=info"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_overrides(&mut config, |var| env.get(var).map(|v| v.to_string()))
            .expect("overrides should apply");

        assert_eq!(config.database.path, ":memory:");
        assert_eq!(config.database.engine, "postgresql_psycopg2");
        assert_eq!(config.database.transaction_mode, TransactionMode::Managed);
        assert!(config.database.debug_sql);
        assert_eq!(config.logging.level, "nb_db::sql=info");
        assert!(!config.logging.json);
    }

    #[test]
    fn non_sqlite_engine_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("should create temp file");
        writeln!(file, "[database]\nengine = \"postgresql_psycopg2\"").expect("should write config");
        let err = load_config(file.path().to_str().expect("utf-8 path")).expect_err("bad engine");
        assert!(matches!(err, ConfigError::UnsupportedEngine(ref e) if e == "postgresql_psycopg2"));

        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn unknown_transaction_mode_is_rejected() {
        let mut config = Config::default();
        let err = apply_overrides(&mut config, |var| {
            (var == "NB_TRANSACTION_MODE").then(|| "sometimes".to_string())
        })
        .expect_err("bad mode");
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "NB_TRANSACTION_MODE",
                ..
            }
        ));
    }
}
