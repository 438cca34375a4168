//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by the persistence layer.

use super::{DbError, DbResult};
use crate::config::{ConfigError, DriverKind, RepoConfig};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens a SQLite database file with default settings.
///
/// # Side effects
/// - Creates the file when it does not exist.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let config = RepoConfig::file(path.as_ref());
    open_with(&config, "file", || Connection::open(path.as_ref()))
}

/// Opens a private in-memory SQLite database with default settings.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with(&RepoConfig::in_memory(), "memory", Connection::open_in_memory)
}

/// Opens the connection described by `config`.
///
/// # Errors
/// - Returns `DbError::Config` when the configuration is incomplete.
/// - Returns `DbError::Sqlite` when SQLite cannot open or configure the
///   connection.
pub fn open_with_config(config: &RepoConfig) -> DbResult<Connection> {
    match (config.driver, config.database_path.as_deref()) {
        (DriverKind::Sqlite, Some(path)) => open_with(config, "file", || Connection::open(path)),
        (DriverKind::Sqlite, None) => Err(ConfigError::MissingDatabasePath.into()),
        (DriverKind::SqliteMemory, _) => open_with(config, "memory", Connection::open_in_memory),
    }
}

fn open_with<F>(config: &RepoConfig, mode: &'static str, opener: F) -> DbResult<Connection>
where
    F: FnOnce() -> rusqlite::Result<Connection>,
{
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let conn = opener()
        .map_err(DbError::from)
        .and_then(|conn| configure(&conn, config).map(|()| conn));

    match conn {
        Ok(conn) => {
            info!(
                "event=db_open module=db status=ok mode={mode} foreign_keys={} duration_ms={}",
                config.foreign_keys,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn configure(conn: &Connection, config: &RepoConfig) -> DbResult<()> {
    let pragma = if config.foreign_keys {
        "PRAGMA foreign_keys = ON;"
    } else {
        "PRAGMA foreign_keys = OFF;"
    };
    conn.execute_batch(pragma)?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms.max(1)))?;
    Ok(())
}
