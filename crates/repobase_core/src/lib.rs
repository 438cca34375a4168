//! Generic repository layer over SQLite.
//! Entities describe their table shape; repositories handle CRUD, paging,
//! raw SQL and a lazily started unit of work for them.

pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod paging;
pub mod repo;

pub use config::{ConfigError, ConfigResult, DriverKind, RepoConfig};
pub use context::{
    EntityState, PersistenceContext, PersistenceError, PersistenceResult, ProcedureOutput,
    SqliteContext,
};
pub use db::{open_db, open_db_in_memory, open_with_config, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::Entity;
pub use model::predicate::{CompareOp, EntityQuery, OrderBy, Predicate, TableQuery};
pub use model::raw::{RawQuery, SqlParam};
pub use model::row::DynamicRow;
pub use paging::page::{DynamicPage, GridPage, Page};
pub use paging::page_math::{compute_boundaries, page_count, PageBounds, RowWindow};
pub use repo::{
    RepoError, RepoResult, Repository, RepositoryBase, SqliteRepository, TransactionHandle,
    TransactionState,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
