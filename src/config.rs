//! Layered configuration
//!
//! Sources, lowest to highest precedence:
//! 1. built-in defaults
//! 2. a TOML file (`SQLHELPER_CONFIG_PATH`, or `sqlhelper.toml` if present)
//! 3. `SQLHELPER_DATABASE__*` / `SQLHELPER_LOGGING__*` environment variables
//!    (a `.env` file is loaded first; a missing one is skipped, a malformed
//!    one is an error)
//! 4. `DB_USER`, `DB_PASSWORD`, `DB_CONNECTSTRING`
//! 5. values set on [`ConfigBuilder`]

use std::env;
use std::fmt;
use std::path::PathBuf;

use config::{Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_PATH_ENV: &str = "SQLHELPER_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "sqlhelper";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    /// `postgres://...` URL or `host[:port]/service`
    pub connect_string: Option<String>,
    pub pool_min: u32,
    pub pool_max: u32,
    pub pool_increment: u32,
    pub acquire_timeout_secs: u64,
    /// Row cap applied when a request does not set its own; 0 means no limit
    pub max_rows: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            user: None,
            password: None,
            connect_string: None,
            pool_min: 0,
            pool_max: 4,
            pool_increment: 1,
            acquire_timeout_secs: 60,
            max_rows: 5000,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_string", &self.connect_string)
            .field("pool_min", &self.pool_min)
            .field("pool_max", &self.pool_max)
            .field("pool_increment", &self.pool_increment)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("max_rows", &self.max_rows)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.connect_string.as_deref() {
            Some(s) if !s.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "connect_string is required (set DB_CONNECTSTRING or database.connect_string)"
                        .to_string(),
                ))
            }
        }
        if self.pool_max == 0 {
            return Err(ConfigError::Invalid("pool_max must be at least 1".to_string()));
        }
        if self.pool_min > self.pool_max {
            return Err(ConfigError::Invalid(format!(
                "pool_min ({}) must not exceed pool_max ({})",
                self.pool_min, self.pool_max
            )));
        }
        if self.pool_increment == 0 {
            return Err(ConfigError::Invalid(
                "pool_increment must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default sources with no overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }
}

/// Programmatic overrides applied on top of every other source
pub struct ConfigBuilder {
    user: Option<String>,
    password: Option<String>,
    connect_string: Option<String>,
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
    load_env: bool,
}

impl ConfigBuilder {
    pub fn user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    pub fn password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn connect_string(mut self, connect_string: Option<String>) -> Self {
        self.connect_string = connect_string;
        self
    }

    /// Explicit config file; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Explicit dotenv file read instead of `.env`; it must exist
    pub fn env_file(mut self, path: Option<PathBuf>) -> Self {
        self.env_file = path;
        self
    }

    /// Skip `.env` and environment variables (files and overrides only)
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let use_env = self.load_env;
        if use_env {
            let loaded = match &self.env_file {
                Some(path) => dotenvy::from_path(path),
                None => dotenvy::dotenv().map(|_| ()),
            };
            match loaded {
                Ok(()) => {}
                Err(e) if e.not_found() && self.env_file.is_none() => {}
                Err(e) => return Err(e.into()),
            }
        }

        let defaults = DatabaseConfig::default();
        let mut builder = config::Config::builder()
            .set_default("database.pool_min", defaults.pool_min)?
            .set_default("database.pool_max", defaults.pool_max)?
            .set_default("database.pool_increment", defaults.pool_increment)?
            .set_default("database.acquire_timeout_secs", defaults.acquire_timeout_secs)?
            .set_default("database.max_rows", defaults.max_rows as u64)?
            .set_default("logging.level", LoggingConfig::default().level)?;

        let explicit_path = self.config_path.clone().or_else(|| {
            use_env
                .then(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
                .flatten()
        });
        builder = match explicit_path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        if use_env {
            builder = builder
                .add_source(
                    Environment::with_prefix("SQLHELPER")
                        .prefix_separator("_")
                        .separator("__")
                        .try_parsing(true),
                )
                .set_override_option("database.user", env::var("DB_USER").ok())?
                .set_override_option("database.password", env::var("DB_PASSWORD").ok())?
                .set_override_option(
                    "database.connect_string",
                    env::var("DB_CONNECTSTRING").ok(),
                )?;
        }

        let config: Config = builder
            .set_override_option("database.user", self.user)?
            .set_override_option("database.password", self.password)?
            .set_override_option("database.connect_string", self.connect_string)?
            .build()?
            .try_deserialize()?;

        config.database.validate()?;
        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            user: None,
            password: None,
            connect_string: None,
            config_path: None,
            env_file: None,
            load_env: true,
        }
    }
}
