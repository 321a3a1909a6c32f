//! # Register Configuration
//!
//! ## Load Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. RegisterConfig::default()                                           │
//! │  2. TOML file    --config <path>, else <config dir>/register.toml      │
//! │                  (missing default file is fine, missing --config isn't) │
//! │  3. TALLY_* environment variables                                       │
//! │  4. validate()                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example File
//! ```toml
//! [store]
//! name = "Corner Shop"
//! currency_code = "EUR"
//! currency_exponent = 2
//!
//! [register]
//! cashier_id = "till-1"
//! catalog_timeout_ms = 2000
//! persistence_timeout_ms = 5000
//!
//! [database]
//! path = "/var/lib/tally/tally.db"
//! max_connections = 5
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tally_core::{Currency, Timeouts};

const CONFIG_FILE: &str = "register.toml";
const DB_FILE: &str = "tally.db";

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub name: String,
    pub currency_code: String,
    pub currency_exponent: u8,
}

impl Default for StoreSection {
    fn default() -> Self {
        StoreSection {
            name: "Tally Store".to_string(),
            currency_code: "USD".to_string(),
            currency_exponent: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterSection {
    /// Cashier the session records on every sale. Must exist in the database.
    pub cashier_id: String,
    pub catalog_timeout_ms: u64,
    pub persistence_timeout_ms: u64,
}

impl Default for RegisterSection {
    fn default() -> Self {
        let timeouts = Timeouts::default();
        RegisterSection {
            cashier_id: "default".to_string(),
            catalog_timeout_ms: timeouts.catalog.as_millis() as u64,
            persistence_timeout_ms: timeouts.persistence.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Database file. Defaults to the platform data directory.
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: None,
            max_connections: 5,
        }
    }
}

/// Everything the register needs to start a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterConfig {
    pub store: StoreSection,
    pub register: RegisterSection,
    pub database: DatabaseSection,
}

impl RegisterConfig {
    /// Loads defaults, then the config file, then `TALLY_*` variables.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => RegisterConfig::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies overrides from a variable source (the process environment in
    /// production).
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("TALLY_STORE_NAME") {
            self.store.name = v;
        }
        if let Some(v) = var("TALLY_CURRENCY_CODE") {
            self.store.currency_code = v;
        }
        if let Some(v) = var("TALLY_CURRENCY_EXPONENT") {
            self.store.currency_exponent = parse_var("TALLY_CURRENCY_EXPONENT", &v)?;
        }
        if let Some(v) = var("TALLY_CASHIER_ID") {
            self.register.cashier_id = v;
        }
        if let Some(v) = var("TALLY_CATALOG_TIMEOUT_MS") {
            self.register.catalog_timeout_ms = parse_var("TALLY_CATALOG_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("TALLY_PERSISTENCE_TIMEOUT_MS") {
            self.register.persistence_timeout_ms = parse_var("TALLY_PERSISTENCE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("TALLY_DB_PATH") {
            self.database.path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("TALLY_DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_var("TALLY_DB_MAX_CONNECTIONS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.currency()?;

        if self.register.cashier_id.trim().is_empty() {
            return Err(ConfigError::Invalid("register.cashier_id is empty".to_string()));
        }
        if self.register.catalog_timeout_ms == 0 || self.register.persistence_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn currency(&self) -> Result<Currency, ConfigError> {
        Currency::new(&self.store.currency_code, self.store.currency_exponent)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            catalog: Duration::from_millis(self.register.catalog_timeout_ms),
            persistence: Duration::from_millis(self.register.persistence_timeout_ms),
        }
    }

    /// Configured database path, or `tally.db` in the platform data directory.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database.path {
            return path.clone();
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().join(DB_FILE))
            .unwrap_or_else(|| PathBuf::from(DB_FILE))
    }
}

/// `register.toml` in the platform config directory.
///
/// - **macOS**: `~/Library/Application Support/com.tally.register/`
/// - **Linux**: `~/.config/register/`
/// - **Windows**: `%APPDATA%\tally\register\config\`
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "tally", "register")
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
