//! Generic repository contract and its error type.
//!
//! # Responsibility
//! - Name every data-access operation a caller may run against entity set `T`.
//! - Report failures with the operation and entity that produced them.
//!
//! # Invariants
//! - Missing rows are `Ok(None)`, never an error.
//! - Storage failures are wrapped, not reinterpreted.

use super::transaction::TransactionState;
use crate::context::PersistenceError;
use crate::model::entity::Entity;
use crate::model::predicate::{EntityQuery, OrderBy, Predicate, TableQuery};
use crate::model::raw::{RawQuery, SqlParam};
use crate::model::row::DynamicRow;
use crate::paging::page::{DynamicPage, Page};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    /// A single-row read matched `matched` rows or more.
    AmbiguousResult {
        operation: &'static str,
        entity: &'static str,
        matched: usize,
    },
    Persistence {
        operation: &'static str,
        entity: &'static str,
        source: PersistenceError,
    },
    /// Transaction control called in a state that forbids it.
    TransactionState {
        operation: &'static str,
        state: TransactionState,
        message: String,
    },
}

impl RepoError {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::AmbiguousResult { operation, .. } => operation,
            Self::Persistence { operation, .. } => operation,
            Self::TransactionState { operation, .. } => operation,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AmbiguousResult {
                operation,
                entity,
                matched,
            } => write!(
                f,
                "{operation} on {entity} expected at most one row but matched {matched} or more"
            ),
            Self::Persistence {
                operation,
                entity,
                source,
            } => write!(f, "{operation} on {entity} failed: {source}"),
            Self::TransactionState {
                operation,
                state,
                message,
            } => write!(
                f,
                "{operation} not allowed in transaction state {}: {message}",
                state.as_str()
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AmbiguousResult { .. } => None,
            Self::Persistence { source, .. } => Some(source),
            Self::TransactionState { .. } => None,
        }
    }
}

/// Data-access operations over entity set `T`.
///
/// Tracked mutations take `&mut self`; reads, raw SQL and transaction control
/// take `&self`. Raw SQL never starts the repository transaction but runs
/// inside it once the caller has begun one.
pub trait Repository<T: Entity> {
    /// Loads the single row matching `predicate` without tracking it.
    fn get(&self, predicate: &Predicate) -> RepoResult<Option<T>>;
    fn save(&mut self, entity: &T) -> RepoResult<bool>;
    fn update(&mut self, entity: &T) -> RepoResult<bool>;
    /// `update` when `is_edit`, `save` otherwise.
    fn save_or_update(&mut self, entity: &T, is_edit: bool) -> RepoResult<bool>;
    /// Deletes the rows matching `predicate`, or every row of `T` for `None`.
    fn delete(&mut self, predicate: Option<&Predicate>) -> RepoResult<usize>;
    fn delete_by_sql(&self, command: &RawQuery) -> RepoResult<usize>;
    fn execute_sql_command(&self, command: &RawQuery) -> RepoResult<usize>;
    /// Runs `commands` as one unit of work.
    fn execute_sql_commands(&self, commands: &[RawQuery]) -> RepoResult<usize>;
    fn execute_sql_query(&self, query: &RawQuery) -> RepoResult<Vec<DynamicRow>>;
    fn is_exist(&self, predicate: &Predicate) -> RepoResult<bool>;
    fn is_exist_by_sql(&self, query: &RawQuery) -> RepoResult<bool>;

    fn save_list(&mut self, entities: &[T]) -> RepoResult<usize>;
    fn save_list_of<E: Entity>(&mut self, entities: &[E]) -> RepoResult<usize>;
    fn update_list(&mut self, entities: &[T]) -> RepoResult<usize>;
    fn delete_list(&mut self, entities: &[T]) -> RepoResult<usize>;
    fn delete_list_of<E: Entity>(&mut self, entities: &[E]) -> RepoResult<usize>;

    fn load_all(&self, predicate: Option<&Predicate>, order: &[OrderBy]) -> RepoResult<Vec<T>>;
    fn select_by_sql(&self, query: &RawQuery) -> RepoResult<Vec<T>>;
    fn select_by_sql_as<E: Entity>(&self, query: &RawQuery) -> RepoResult<Vec<E>>;

    /// Pages `T`. Without `order` rows are ordered by primary key.
    fn page(
        &self,
        index: i64,
        page_size: i64,
        predicate: Option<&Predicate>,
        order: &[OrderBy],
    ) -> RepoResult<Page<T>>;
    fn page_projected<R, F>(
        &self,
        index: i64,
        page_size: i64,
        predicate: Option<&Predicate>,
        order: &[OrderBy],
        selector: F,
    ) -> RepoResult<Page<R>>
    where
        F: FnMut(T) -> R;
    fn page_query(
        &self,
        query: &EntityQuery<T>,
        index: i64,
        page_size: i64,
    ) -> RepoResult<Page<T>>;
    fn page_by_sql(
        &self,
        index: i64,
        page_size: i64,
        query: &RawQuery,
        order_by: Option<&str>,
    ) -> RepoResult<DynamicPage>;
    fn page_by_sql_as<E: Entity>(
        &self,
        index: i64,
        page_size: i64,
        query: &RawQuery,
        order_by: Option<&str>,
    ) -> RepoResult<Page<E>>;
    fn page_by_parts(
        &self,
        index: i64,
        page_size: i64,
        parts: &TableQuery,
        params: &[SqlParam],
    ) -> RepoResult<DynamicPage>;

    /// Runs a registered command procedure; returns affected rows.
    fn execute_proc(&self, name: &str, params: &[SqlParam]) -> RepoResult<usize>;
    /// Runs a registered query procedure.
    fn execute_query_proc(&self, name: &str, params: &[SqlParam]) -> RepoResult<Vec<DynamicRow>>;

    fn begin_transaction(&self) -> RepoResult<()>;
    /// Commits the active unit of work; a no-op when nothing is pending.
    fn commit(&self) -> RepoResult<()>;
    fn rollback(&self) -> RepoResult<()>;
    fn transaction_state(&self) -> TransactionState;
}

#[cfg(test)]
mod tests {
    use super::RepoError;
    use crate::context::PersistenceError;
    use crate::repo::transaction::TransactionState;
    use std::error::Error;

    #[test]
    fn persistence_error_keeps_source_chain() {
        let err = RepoError::Persistence {
            operation: "save",
            entity: "Customer",
            source: PersistenceError::UnknownProcedure("sync".to_string()),
        };
        assert_eq!(err.to_string(), "save on Customer failed: unknown procedure `sync`");
        assert!(err.source().is_some());
        assert_eq!(err.operation(), "save");
    }

    #[test]
    fn transaction_state_error_names_state() {
        let err = RepoError::TransactionState {
            operation: "rollback",
            state: TransactionState::Committed,
            message: "transaction already committed".to_string(),
        };
        assert!(err.to_string().contains("committed"));
        assert!(err.source().is_none());
    }
}
