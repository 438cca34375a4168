//! Database driver selection for the persistence layer.
//!
//! # Responsibility
//! - Resolve which database driver the persistence context adapts.
//! - Carry the few connection knobs the bootstrap needs.
//!
//! # Invariants
//! - A file-backed driver always has a database path.
//! - Unknown driver names are rejected instead of silently defaulting.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DRIVER: &str = "REPOBASE_DRIVER";
pub const ENV_DATABASE_PATH: &str = "REPOBASE_DATABASE_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "REPOBASE_BUSY_TIMEOUT_MS";
pub const ENV_FOREIGN_KEYS: &str = "REPOBASE_FOREIGN_KEYS";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Database driver backing a persistence context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// SQLite database file.
    Sqlite,
    /// Private in-memory SQLite database, discarded with the connection.
    #[serde(alias = "memory")]
    SqliteMemory,
}

impl DriverKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::SqliteMemory => "sqlite_memory",
        }
    }

    /// Parses a driver name as written in environment/app settings.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "sqlite_memory" | "memory" => Ok(Self::SqliteMemory),
            other => Err(ConfigError::UnsupportedDriver(other.to_string())),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnsupportedDriver(String),
    MissingDatabasePath,
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedDriver(name) => {
                write!(f, "unsupported database driver `{name}`; expected sqlite|sqlite_memory")
            }
            Self::MissingDatabasePath => {
                write!(f, "driver `sqlite` requires {ENV_DATABASE_PATH} to be set")
            }
            Self::InvalidValue { key, value } => write!(f, "invalid value `{value}` for {key}"),
        }
    }
}

impl Error for ConfigError {}

/// Connection settings consumed by `db::open_with_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub driver: DriverKind,
    pub database_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl RepoConfig {
    pub fn in_memory() -> Self {
        Self {
            driver: DriverKind::SqliteMemory,
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: true,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            driver: DriverKind::Sqlite,
            database_path: Some(path.into()),
            ..Self::in_memory()
        }
    }

    /// Reads settings from process environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary key lookup.
    ///
    /// Missing keys fall back to defaults; the driver defaults to
    /// `sqlite_memory`.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::in_memory();

        if let Some(driver) = non_blank(lookup(ENV_DRIVER)) {
            config.driver = DriverKind::parse(&driver)?;
        }
        config.database_path = non_blank(lookup(ENV_DATABASE_PATH)).map(PathBuf::from);

        if let Some(raw) = non_blank(lookup(ENV_BUSY_TIMEOUT_MS)) {
            config.busy_timeout_ms =
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: ENV_BUSY_TIMEOUT_MS,
                        value: raw.clone(),
                    })?;
            // zero would disable the busy handler entirely
            if config.busy_timeout_ms == 0 {
                config.busy_timeout_ms = DEFAULT_BUSY_TIMEOUT_MS;
            }
        }

        if let Some(raw) = non_blank(lookup(ENV_FOREIGN_KEYS)) {
            config.foreign_keys = parse_flag(&raw).ok_or(ConfigError::InvalidValue {
                key: ENV_FOREIGN_KEYS,
                value: raw.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.driver == DriverKind::Sqlite && self.database_path.is_none() {
            return Err(ConfigError::MissingDatabasePath);
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
