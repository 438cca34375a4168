//! Persistence context capability and its SQLite adapter.
//!
//! # Responsibility
//! - Define what a repository needs from the storage engine: change
//!   tracking, filtered queries, raw SQL, unit-of-work control, procedures.
//! - Provide the SQLite implementation used by default.
//!
//! # Invariants
//! - `save_changes` is atomic: all pending entries persist or none do.
//! - Reads never attach entities to the tracker.
//! - Failures are reported as-is; contexts never retry.

use crate::db::DbError;
use crate::model::entity::Entity;
use crate::model::predicate::{OrderBy, Predicate};
use crate::model::raw::{RawQuery, SqlParam};
use crate::model::row::DynamicRow;
use crate::paging::page_math::RowWindow;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod sqlite;
mod tracker;
mod translate;

pub use sqlite::SqliteContext;
pub use tracker::EntityState;
pub(crate) use translate::table_query_sql;

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Storage-level failure reported by a persistence context.
#[derive(Debug)]
pub enum PersistenceError {
    /// Driver, constraint or connection failure.
    Db(DbError),
    /// Column or table name that is not a plain SQL identifier.
    InvalidIdentifier(String),
    /// Named parameter not present in the SQL text.
    UnknownParameter(String),
    /// Procedure name not registered with the context.
    UnknownProcedure(String),
    /// Transaction control issued in the wrong connection state.
    TransactionConflict(String),
    /// Row could not be decoded into the requested shape.
    InvalidData(String),
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidIdentifier(name) => write!(f, "invalid SQL identifier `{name}`"),
            Self::UnknownParameter(name) => write!(f, "unknown SQL parameter `{name}`"),
            Self::UnknownProcedure(name) => write!(f, "unknown procedure `{name}`"),
            Self::TransactionConflict(message) => write!(f, "transaction conflict: {message}"),
            Self::InvalidData(message) => write!(f, "invalid row data: {message}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidIdentifier(_) => None,
            Self::UnknownParameter(_) => None,
            Self::UnknownProcedure(_) => None,
            Self::TransactionConflict(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for PersistenceError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Result of a procedure call: affected rows for commands, rows for queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureOutput {
    pub affected: usize,
    pub rows: Vec<DynamicRow>,
}

/// Storage capability consumed by repositories.
pub trait PersistenceContext {
    /// Marks `entity` for insertion on the next `save_changes`.
    fn track_new<E: Entity>(&mut self, entity: &E);
    /// Marks `entity` for update by primary key.
    fn track_modified<E: Entity>(&mut self, entity: &E);
    /// Marks `entity` for deletion by primary key.
    fn track_removed<E: Entity>(&mut self, entity: &E);
    /// Forgets `entity` without touching stored data.
    fn detach<E: Entity>(&mut self, entity: &E);
    /// Drops pending insertions of entity type `E`.
    fn clear_pending_new<E: Entity>(&mut self);
    fn entry_state<E: Entity>(&self, entity: &E) -> Option<EntityState>;
    fn tracked_len(&self) -> usize;
    /// Persists every pending entry atomically; returns affected rows.
    fn save_changes(&mut self) -> PersistenceResult<usize>;

    fn query<E: Entity>(
        &self,
        predicate: Option<&Predicate>,
        order: &[OrderBy],
        window: Option<RowWindow>,
    ) -> PersistenceResult<Vec<E>>;
    fn count<E: Entity>(&self, predicate: Option<&Predicate>) -> PersistenceResult<i64>;
    fn exists<E: Entity>(&self, predicate: Option<&Predicate>) -> PersistenceResult<bool>;

    fn execute_raw(&self, command: &RawQuery) -> PersistenceResult<usize>;
    /// Runs several commands as one unit of work.
    fn execute_raw_batch(&self, commands: &[RawQuery]) -> PersistenceResult<usize>;
    fn query_raw(
        &self,
        query: &RawQuery,
        order_by: Option<&str>,
        window: Option<RowWindow>,
    ) -> PersistenceResult<Vec<DynamicRow>>;
    fn query_raw_as<E: Entity>(
        &self,
        query: &RawQuery,
        order_by: Option<&str>,
        window: Option<RowWindow>,
    ) -> PersistenceResult<Vec<E>>;
    fn count_raw(&self, query: &RawQuery) -> PersistenceResult<i64>;
    fn exists_raw(&self, query: &RawQuery) -> PersistenceResult<bool>;

    fn begin_transaction(&self) -> PersistenceResult<()>;
    fn commit_transaction(&self) -> PersistenceResult<()>;
    fn rollback_transaction(&self) -> PersistenceResult<()>;

    fn call_procedure(&self, name: &str, params: &[SqlParam])
        -> PersistenceResult<ProcedureOutput>;
}
