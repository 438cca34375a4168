//! Generic repository engine.
//!
//! # Responsibility
//! - Implement [`Repository`] once for every entity type on top of any
//!   [`PersistenceContext`].
//! - Start the unit of work lazily and resolve it on commit, rollback or drop.
//!
//! # Invariants
//! - Tracked mutations run `ensure transaction -> detach -> mark -> save ->
//!   detach`; entries stay pending when the save fails and are replaced by
//!   the next mutation of the same key.
//! - Empty bulk input and unmatched deletes return `0` without starting the
//!   transaction.
//! - Paging counts first and only fetches a non-empty window.

use super::repository::{RepoError, RepoResult, Repository};
use super::transaction::{TransactionHandle, TransactionState};
use crate::config::RepoConfig;
use crate::context::{
    table_query_sql, PersistenceContext, PersistenceError, PersistenceResult, SqliteContext,
};
use crate::db::DbResult;
use crate::model::entity::{entity_name, Entity};
use crate::model::predicate::{EntityQuery, OrderBy, Predicate, TableQuery};
use crate::model::raw::{RawQuery, SqlParam};
use crate::model::row::DynamicRow;
use crate::paging::page::{DynamicPage, Page};
use crate::paging::page_math::{PageBounds, RowWindow};
use log::{debug, error, warn};
use std::marker::PhantomData;
use std::time::Instant;

/// Repository over entity set `T` backed by context `C`.
///
/// Only the transaction handle is safe to share between threads. With
/// [`SqliteContext`] the repository itself is `!Sync` (a `rusqlite::Connection`
/// is not `Sync`), so use one repository per thread or unit of work.
pub struct RepositoryBase<T: Entity, C: PersistenceContext> {
    context: C,
    transaction: TransactionHandle,
    _entity: PhantomData<fn() -> T>,
}

/// Repository backed by [`SqliteContext`].
pub type SqliteRepository<T> = RepositoryBase<T, SqliteContext>;

#[derive(Debug, Clone, Copy)]
enum Mark {
    New,
    Modified,
    Removed,
}

impl<T: Entity> RepositoryBase<T, SqliteContext> {
    /// Opens a SQLite context from `config` and wraps it.
    pub fn open(config: &RepoConfig) -> DbResult<Self> {
        SqliteContext::open(config).map(Self::new)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        SqliteContext::open_in_memory().map(Self::new)
    }
}

impl<T: Entity, C: PersistenceContext> RepositoryBase<T, C> {
    pub fn new(context: C) -> Self {
        Self {
            context,
            transaction: TransactionHandle::new(),
            _entity: PhantomData,
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    fn ensure_transaction(&self, operation: &'static str) -> RepoResult<()> {
        let began = self.transaction.ensure_active(|| {
            self.context
                .begin_transaction()
                .map_err(failed::<T>(operation))
        })?;
        if began {
            debug!(
                "event=transaction_begin module=repo status=ok operation={operation} entity={}",
                entity_name::<T>()
            );
        }
        Ok(())
    }

    fn persist<E: Entity>(
        &mut self,
        operation: &'static str,
        mark: Mark,
        entities: &[E],
    ) -> RepoResult<usize> {
        self.ensure_transaction(operation)?;
        for entity in entities {
            // drop entries a failed save left pending
            self.context.detach(entity);
        }
        for entity in entities {
            match mark {
                Mark::New => self.context.track_new(entity),
                Mark::Modified => self.context.track_modified(entity),
                Mark::Removed => self.context.track_removed(entity),
            }
        }
        let affected = self
            .context
            .save_changes()
            .map_err(failed::<E>(operation))?;
        for entity in entities {
            self.context.detach(entity);
        }
        Ok(affected)
    }

    fn paged<R, N, F>(
        operation: &'static str,
        index: i64,
        page_size: i64,
        count: N,
        fetch: F,
    ) -> RepoResult<Page<R>>
    where
        N: FnOnce() -> PersistenceResult<i64>,
        F: FnOnce(RowWindow) -> PersistenceResult<Vec<R>>,
    {
        let total_count = count().map_err(failed::<T>(operation))?;
        let bounds = PageBounds::compute(index, page_size, total_count);
        let items = match bounds.window() {
            Some(window) => fetch(window).map_err(failed::<T>(operation))?,
            None => Vec::new(),
        };
        Ok(Page::new(bounds, items))
    }

    fn traced<R, F>(operation: &'static str, work: F) -> RepoResult<R>
    where
        F: FnOnce() -> RepoResult<R>,
    {
        let started_at = Instant::now();
        let result = work();
        let duration_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(_) => debug!(
                "event={operation} module=repo status=ok entity={} duration_ms={duration_ms}",
                entity_name::<T>()
            ),
            Err(err) => warn!(
                "event={operation} module=repo status=error entity={} duration_ms={duration_ms} error={err}",
                entity_name::<T>()
            ),
        }
        result
    }
}

fn failed<E>(operation: &'static str) -> impl FnOnce(PersistenceError) -> RepoError {
    let entity = entity_name::<E>();
    move |source| RepoError::Persistence {
        operation,
        entity,
        source,
    }
}

fn key_order<E: Entity>() -> Vec<OrderBy> {
    E::KEY_COLUMNS.iter().map(|column| OrderBy::asc(*column)).collect()
}

impl<T: Entity, C: PersistenceContext> Repository<T> for RepositoryBase<T, C> {
    fn get(&self, predicate: &Predicate) -> RepoResult<Option<T>> {
        Self::traced("get", || {
            let probe = RowWindow {
                offset: 0,
                limit: 2,
            };
            let mut rows = self
                .context
                .query::<T>(Some(predicate), &[], Some(probe))
                .map_err(failed::<T>("get"))?;
            if rows.len() > 1 {
                return Err(RepoError::AmbiguousResult {
                    operation: "get",
                    entity: entity_name::<T>(),
                    matched: rows.len(),
                });
            }
            Ok(rows.pop())
        })
    }

    fn save(&mut self, entity: &T) -> RepoResult<bool> {
        Self::traced("save", || {
            self.persist("save", Mark::New, std::slice::from_ref(entity))
                .map(|affected| affected > 0)
        })
    }

    fn update(&mut self, entity: &T) -> RepoResult<bool> {
        Self::traced("update", || {
            self.persist("update", Mark::Modified, std::slice::from_ref(entity))
                .map(|affected| affected > 0)
        })
    }

    fn save_or_update(&mut self, entity: &T, is_edit: bool) -> RepoResult<bool> {
        if is_edit {
            self.update(entity)
        } else {
            self.save(entity)
        }
    }

    fn delete(&mut self, predicate: Option<&Predicate>) -> RepoResult<usize> {
        Self::traced("delete", || {
            let matches = self
                .context
                .query::<T>(predicate, &[], None)
                .map_err(failed::<T>("delete"))?;
            if matches.is_empty() {
                return Ok(0);
            }
            self.persist("delete", Mark::Removed, &matches)
        })
    }

    fn delete_by_sql(&self, command: &RawQuery) -> RepoResult<usize> {
        Self::traced("delete_by_sql", || {
            self.context
                .execute_raw(command)
                .map_err(failed::<T>("delete_by_sql"))
        })
    }

    fn execute_sql_command(&self, command: &RawQuery) -> RepoResult<usize> {
        Self::traced("execute_sql_command", || {
            self.context
                .execute_raw(command)
                .map_err(failed::<T>("execute_sql_command"))
        })
    }

    fn execute_sql_commands(&self, commands: &[RawQuery]) -> RepoResult<usize> {
        Self::traced("execute_sql_commands", || {
            self.context
                .execute_raw_batch(commands)
                .map_err(failed::<T>("execute_sql_commands"))
        })
    }

    fn execute_sql_query(&self, query: &RawQuery) -> RepoResult<Vec<DynamicRow>> {
        Self::traced("execute_sql_query", || {
            self.context
                .query_raw(query, None, None)
                .map_err(failed::<T>("execute_sql_query"))
        })
    }

    fn is_exist(&self, predicate: &Predicate) -> RepoResult<bool> {
        Self::traced("is_exist", || {
            self.context
                .exists::<T>(Some(predicate))
                .map_err(failed::<T>("is_exist"))
        })
    }

    fn is_exist_by_sql(&self, query: &RawQuery) -> RepoResult<bool> {
        Self::traced("is_exist_by_sql", || {
            self.context
                .exists_raw(query)
                .map_err(failed::<T>("is_exist_by_sql"))
        })
    }

    fn save_list(&mut self, entities: &[T]) -> RepoResult<usize> {
        self.save_list_of(entities)
    }

    fn save_list_of<E: Entity>(&mut self, entities: &[E]) -> RepoResult<usize> {
        if entities.is_empty() {
            return Ok(0);
        }
        Self::traced("save_list", || {
            self.context.clear_pending_new::<E>();
            self.persist("save_list", Mark::New, entities)
        })
    }

    fn update_list(&mut self, entities: &[T]) -> RepoResult<usize> {
        if entities.is_empty() {
            return Ok(0);
        }
        Self::traced("update_list", || {
            self.persist("update_list", Mark::Modified, entities)
        })
    }

    fn delete_list(&mut self, entities: &[T]) -> RepoResult<usize> {
        self.delete_list_of(entities)
    }

    fn delete_list_of<E: Entity>(&mut self, entities: &[E]) -> RepoResult<usize> {
        if entities.is_empty() {
            return Ok(0);
        }
        Self::traced("delete_list", || {
            self.persist("delete_list", Mark::Removed, entities)
        })
    }

    fn load_all(&self, predicate: Option<&Predicate>, order: &[OrderBy]) -> RepoResult<Vec<T>> {
        Self::traced("load_all", || {
            self.context
                .query::<T>(predicate, order, None)
                .map_err(failed::<T>("load_all"))
        })
    }

    fn select_by_sql(&self, query: &RawQuery) -> RepoResult<Vec<T>> {
        self.select_by_sql_as::<T>(query)
    }

    fn select_by_sql_as<E: Entity>(&self, query: &RawQuery) -> RepoResult<Vec<E>> {
        Self::traced("select_by_sql", || {
            self.context
                .query_raw_as::<E>(query, None, None)
                .map_err(failed::<E>("select_by_sql"))
        })
    }

    fn page(
        &self,
        index: i64,
        page_size: i64,
        predicate: Option<&Predicate>,
        order: &[OrderBy],
    ) -> RepoResult<Page<T>> {
        let order = if order.is_empty() {
            key_order::<T>()
        } else {
            order.to_vec()
        };
        Self::traced("page", || {
            Self::paged(
                "page",
                index,
                page_size,
                || self.context.count::<T>(predicate),
                |window| self.context.query::<T>(predicate, &order, Some(window)),
            )
        })
    }

    fn page_projected<R, F>(
        &self,
        index: i64,
        page_size: i64,
        predicate: Option<&Predicate>,
        order: &[OrderBy],
        selector: F,
    ) -> RepoResult<Page<R>>
    where
        F: FnMut(T) -> R,
    {
        self.page(index, page_size, predicate, order)
            .map(|page| page.map_items(selector))
    }

    fn page_query(
        &self,
        query: &EntityQuery<T>,
        index: i64,
        page_size: i64,
    ) -> RepoResult<Page<T>> {
        self.page(index, page_size, query.predicate.as_ref(), &query.order)
    }

    fn page_by_sql(
        &self,
        index: i64,
        page_size: i64,
        query: &RawQuery,
        order_by: Option<&str>,
    ) -> RepoResult<DynamicPage> {
        Self::traced("page_by_sql", || {
            Self::paged(
                "page_by_sql",
                index,
                page_size,
                || self.context.count_raw(query),
                |window| self.context.query_raw(query, order_by, Some(window)),
            )
        })
    }

    fn page_by_sql_as<E: Entity>(
        &self,
        index: i64,
        page_size: i64,
        query: &RawQuery,
        order_by: Option<&str>,
    ) -> RepoResult<Page<E>> {
        Self::traced("page_by_sql", || {
            Self::paged(
                "page_by_sql",
                index,
                page_size,
                || self.context.count_raw(query),
                |window| self.context.query_raw_as::<E>(query, order_by, Some(window)),
            )
        })
    }

    fn page_by_parts(
        &self,
        index: i64,
        page_size: i64,
        parts: &TableQuery,
        params: &[SqlParam],
    ) -> RepoResult<DynamicPage> {
        let sql = table_query_sql(parts).map_err(failed::<T>("page_by_parts"))?;
        let query = RawQuery::with_params(sql, params.to_vec());
        self.page_by_sql(index, page_size, &query, parts.order_by.as_deref())
    }

    fn execute_proc(&self, name: &str, params: &[SqlParam]) -> RepoResult<usize> {
        Self::traced("execute_proc", || {
            self.context
                .call_procedure(name, params)
                .map(|output| output.affected)
                .map_err(failed::<T>("execute_proc"))
        })
    }

    fn execute_query_proc(&self, name: &str, params: &[SqlParam]) -> RepoResult<Vec<DynamicRow>> {
        Self::traced("execute_query_proc", || {
            self.context
                .call_procedure(name, params)
                .map(|output| output.rows)
                .map_err(failed::<T>("execute_query_proc"))
        })
    }

    fn begin_transaction(&self) -> RepoResult<()> {
        self.ensure_transaction("begin_transaction")
    }

    fn commit(&self) -> RepoResult<()> {
        let committed = self.transaction.commit(|| {
            self.context
                .commit_transaction()
                .map_err(failed::<T>("commit"))
        })?;
        if committed {
            debug!(
                "event=transaction_commit module=repo status=ok entity={}",
                entity_name::<T>()
            );
        }
        Ok(())
    }

    fn rollback(&self) -> RepoResult<()> {
        let rolled_back = self.transaction.rollback(|| {
            self.context
                .rollback_transaction()
                .map_err(failed::<T>("rollback"))
        })?;
        if rolled_back {
            debug!(
                "event=transaction_rollback module=repo status=ok entity={}",
                entity_name::<T>()
            );
        }
        Ok(())
    }

    fn transaction_state(&self) -> TransactionState {
        self.transaction.state()
    }
}

impl<T: Entity, C: PersistenceContext> Drop for RepositoryBase<T, C> {
    fn drop(&mut self) {
        if self.transaction.state() != TransactionState::Active {
            return;
        }
        warn!(
            "event=transaction_release module=repo status=rollback entity={} reason=dropped_while_active",
            entity_name::<T>()
        );
        if let Err(err) = self.rollback() {
            error!(
                "event=transaction_release module=repo status=error entity={} error={}",
                entity_name::<T>(),
                err
            );
        }
    }
}
