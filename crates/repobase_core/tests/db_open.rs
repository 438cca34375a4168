use repobase_core::db::{open_db, open_db_in_memory, open_with_config};
use repobase_core::{ConfigError, DbError, DriverKind, RepoConfig, SqliteContext};
use std::collections::HashMap;

fn foreign_keys_enabled(conn: &rusqlite::Connection) -> bool {
    conn.query_row("PRAGMA foreign_keys", [], |row| row.get::<_, i64>(0))
        .unwrap()
        == 1
}

#[test]
fn in_memory_connection_enables_foreign_keys() {
    let conn = open_db_in_memory().unwrap();
    assert!(foreign_keys_enabled(&conn));
}

#[test]
fn file_connection_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repobase.db");

    let conn = open_db(&path).unwrap();
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
        .unwrap();
    drop(conn);

    assert!(path.exists());
}

#[test]
fn config_from_lookup_selects_file_driver() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("env.db");
    let vars = HashMap::from([
        ("REPOBASE_DRIVER", "SQLite".to_string()),
        ("REPOBASE_DATABASE_PATH", path.display().to_string()),
        ("REPOBASE_FOREIGN_KEYS", "off".to_string()),
    ]);

    let config = RepoConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();
    assert_eq!(config.driver, DriverKind::Sqlite);

    let conn = open_with_config(&config).unwrap();
    assert!(!foreign_keys_enabled(&conn));
    assert!(path.exists());
}

#[test]
fn unsupported_driver_is_rejected() {
    let err = RepoConfig::from_lookup(|key| {
        (key == "REPOBASE_DRIVER").then(|| "mssql".to_string())
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedDriver(name) if name == "mssql"));
}

#[test]
fn file_driver_without_path_fails_to_open() {
    let config = RepoConfig {
        database_path: None,
        ..RepoConfig::file("unused.db")
    };
    assert!(matches!(
        open_with_config(&config),
        Err(DbError::Config(ConfigError::MissingDatabasePath))
    ));
    assert!(SqliteContext::open(&config).is_err());
}

#[test]
fn config_deserializes_with_defaults() {
    let config: RepoConfig =
        serde_json::from_str(r#"{ "driver": "sqlite_memory", "busy_timeout_ms": 250 }"#).unwrap();
    assert_eq!(config.driver, DriverKind::SqliteMemory);
    assert_eq!(config.busy_timeout_ms, 250);
    assert!(config.foreign_keys);
}
