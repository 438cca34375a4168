//! SQLite persistence context.
//!
//! # Responsibility
//! - Own one connection plus the change tracker bound to it.
//! - Execute tracked changes, filtered queries and raw SQL.
//! - Expose explicit unit-of-work control (`BEGIN IMMEDIATE` / `COMMIT` /
//!   `ROLLBACK`).
//!
//! # Invariants
//! - `save_changes` and `execute_raw_batch` run inside a savepoint when a
//!   transaction is already open, otherwise inside their own transaction.
//! - A failed flush leaves both the database and the tracker untouched.

use super::tracker::ChangeTracker;
use super::translate::{self, Fragment};
use super::{EntityState, PersistenceContext, PersistenceError, PersistenceResult, ProcedureOutput};
use crate::config::RepoConfig;
use crate::db::{open_db_in_memory, open_with_config, DbResult};
use crate::model::entity::{entity_name, Entity};
use crate::model::predicate::{OrderBy, Predicate};
use crate::model::raw::{RawQuery, SqlParam};
use crate::model::row::DynamicRow;
use crate::paging::page_math::RowWindow;
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Statement, Transaction, TransactionBehavior};
use std::collections::HashMap;

const UNIT_SAVEPOINT: &str = "repobase_unit";

/// SQLite-backed [`PersistenceContext`].
#[derive(Debug)]
pub struct SqliteContext {
    conn: Connection,
    tracker: ChangeTracker,
    procedures: HashMap<String, String>,
}

impl SqliteContext {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            tracker: ChangeTracker::default(),
            procedures: HashMap::new(),
        }
    }

    /// Opens the connection selected by `config`.
    pub fn open(config: &RepoConfig) -> DbResult<Self> {
        open_with_config(config).map(Self::new)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        open_db_in_memory().map(Self::new)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Whether an explicit transaction is open on the connection.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Registers a named SQL statement callable through `call_procedure`.
    ///
    /// SQLite has no stored procedures; the registry stands in for them.
    /// Re-registering a name replaces the previous body.
    pub fn register_procedure(&mut self, name: impl Into<String>, sql: impl Into<String>) {
        self.procedures.insert(name.into(), sql.into());
    }
}

impl PersistenceContext for SqliteContext {
    fn track_new<E: Entity>(&mut self, entity: &E) {
        self.tracker.track_new(entity);
    }

    fn track_modified<E: Entity>(&mut self, entity: &E) {
        self.tracker.track_modified(entity);
    }

    fn track_removed<E: Entity>(&mut self, entity: &E) {
        self.tracker.track_removed(entity);
    }

    fn detach<E: Entity>(&mut self, entity: &E) {
        self.tracker.detach(entity);
    }

    fn clear_pending_new<E: Entity>(&mut self) {
        self.tracker.clear_pending_new::<E>();
    }

    fn entry_state<E: Entity>(&self, entity: &E) -> Option<EntityState> {
        self.tracker.state_of(entity)
    }

    fn tracked_len(&self) -> usize {
        self.tracker.len()
    }

    fn save_changes(&mut self) -> PersistenceResult<usize> {
        if !self.tracker.has_pending() {
            return Ok(0);
        }

        let statements = self
            .tracker
            .pending()
            .map(translate::entry_statement)
            .collect::<PersistenceResult<Vec<Fragment>>>()?;

        let affected = unit_of_work(&self.conn, |conn| {
            let mut total = 0;
            for statement in &statements {
                total += conn.execute(&statement.sql, params_from_iter(statement.params.iter()))?;
            }
            Ok(total)
        })?;

        self.tracker.accept_changes();
        debug!(
            "event=save_changes module=context status=ok statements={} affected={}",
            statements.len(),
            affected
        );
        Ok(affected)
    }

    fn query<E: Entity>(
        &self,
        predicate: Option<&Predicate>,
        order: &[OrderBy],
        window: Option<RowWindow>,
    ) -> PersistenceResult<Vec<E>> {
        let fragment = translate::select_sql(E::TABLE, E::COLUMNS, predicate, order, window)?;
        let mut stmt = self.conn.prepare(&fragment.sql)?;
        let rows = stmt.query_map(params_from_iter(fragment.params.iter()), |row| {
            E::from_row(row)
        })?;
        rows.collect::<rusqlite::Result<Vec<E>>>()
            .map_err(decode_error::<E>)
    }

    fn count<E: Entity>(&self, predicate: Option<&Predicate>) -> PersistenceResult<i64> {
        let fragment = translate::count_sql(E::TABLE, predicate)?;
        let count = self.conn.query_row(
            &fragment.sql,
            params_from_iter(fragment.params.iter()),
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count)
    }

    fn exists<E: Entity>(&self, predicate: Option<&Predicate>) -> PersistenceResult<bool> {
        let fragment = translate::exists_sql(E::TABLE, predicate)?;
        let exists = self.conn.query_row(
            &fragment.sql,
            params_from_iter(fragment.params.iter()),
            |row| row.get::<_, i64>(0),
        )?;
        Ok(exists == 1)
    }

    fn execute_raw(&self, command: &RawQuery) -> PersistenceResult<usize> {
        let mut stmt = prepare_bound(&self.conn, &command.sql, &command.params)?;
        Ok(stmt.raw_execute()?)
    }

    fn execute_raw_batch(&self, commands: &[RawQuery]) -> PersistenceResult<usize> {
        if commands.is_empty() {
            return Ok(0);
        }
        unit_of_work(&self.conn, |conn| {
            let mut total = 0;
            for command in commands {
                let mut stmt = prepare_bound(conn, &command.sql, &command.params)?;
                total += stmt.raw_execute()?;
            }
            Ok(total)
        })
    }

    fn query_raw(
        &self,
        query: &RawQuery,
        order_by: Option<&str>,
        window: Option<RowWindow>,
    ) -> PersistenceResult<Vec<DynamicRow>> {
        let sql = wrap_for_paging(query, order_by, window);
        let mut stmt = prepare_bound(&self.conn, &sql, &query.params)?;
        read_dynamic_rows(&mut stmt)
    }

    fn query_raw_as<E: Entity>(
        &self,
        query: &RawQuery,
        order_by: Option<&str>,
        window: Option<RowWindow>,
    ) -> PersistenceResult<Vec<E>> {
        let sql = wrap_for_paging(query, order_by, window);
        let mut stmt = prepare_bound(&self.conn, &sql, &query.params)?;
        let mut rows = stmt.raw_query();
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(E::from_row(row).map_err(decode_error::<E>)?);
        }
        Ok(entities)
    }

    fn count_raw(&self, query: &RawQuery) -> PersistenceResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM ({}) AS counted", query.trimmed_sql());
        let mut stmt = prepare_bound(&self.conn, &sql, &query.params)?;
        scalar_i64(&mut stmt)
    }

    fn exists_raw(&self, query: &RawQuery) -> PersistenceResult<bool> {
        let sql = format!("SELECT EXISTS({})", query.trimmed_sql());
        let mut stmt = prepare_bound(&self.conn, &sql, &query.params)?;
        Ok(scalar_i64(&mut stmt)? == 1)
    }

    fn begin_transaction(&self) -> PersistenceResult<()> {
        if self.in_transaction() {
            return Err(PersistenceError::TransactionConflict(
                "connection already has an open transaction".to_string(),
            ));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    fn commit_transaction(&self) -> PersistenceResult<()> {
        if !self.in_transaction() {
            return Err(PersistenceError::TransactionConflict(
                "no open transaction to commit".to_string(),
            ));
        }
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback_transaction(&self) -> PersistenceResult<()> {
        // SQLite may already have rolled back on its own (e.g. SQLITE_FULL).
        if !self.in_transaction() {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }

    fn call_procedure(
        &self,
        name: &str,
        params: &[SqlParam],
    ) -> PersistenceResult<ProcedureOutput> {
        let body = self
            .procedures
            .get(name)
            .ok_or_else(|| PersistenceError::UnknownProcedure(name.to_string()))?;
        let mut stmt = prepare_bound(&self.conn, body, params)?;

        if stmt.column_count() == 0 {
            return Ok(ProcedureOutput {
                affected: stmt.raw_execute()?,
                rows: Vec::new(),
            });
        }

        Ok(ProcedureOutput {
            affected: 0,
            rows: read_dynamic_rows(&mut stmt)?,
        })
    }
}

/// Runs `work` atomically: in its own immediate transaction on an idle
/// connection, or inside a savepoint of the already open transaction.
fn unit_of_work<R, F>(conn: &Connection, work: F) -> PersistenceResult<R>
where
    F: FnOnce(&Connection) -> PersistenceResult<R>,
{
    if conn.is_autocommit() {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let result = work(&tx)?;
        tx.commit()?;
        return Ok(result);
    }

    conn.execute_batch(&format!("SAVEPOINT {UNIT_SAVEPOINT};"))?;
    match work(conn) {
        Ok(result) => {
            conn.execute_batch(&format!("RELEASE {UNIT_SAVEPOINT};"))?;
            Ok(result)
        }
        Err(err) => {
            if let Err(rollback_err) = conn.execute_batch(&format!(
                "ROLLBACK TO {UNIT_SAVEPOINT}; RELEASE {UNIT_SAVEPOINT};"
            )) {
                warn!(
                    "event=savepoint_rollback module=context status=error error={}",
                    rollback_err
                );
            }
            Err(err)
        }
    }
}

fn prepare_bound<'conn>(
    conn: &'conn Connection,
    sql: &str,
    params: &[SqlParam],
) -> PersistenceResult<Statement<'conn>> {
    let mut stmt = conn.prepare(sql)?;
    let mut next_positional = 1;
    for param in params {
        let index = if param.is_positional() {
            let index = next_positional;
            next_positional += 1;
            index
        } else {
            let name = parameter_name(&param.name);
            stmt.parameter_index(&name)?
                .ok_or_else(|| PersistenceError::UnknownParameter(param.name.clone()))?
        };
        stmt.raw_bind_parameter(index, &param.value)?;
    }
    Ok(stmt)
}

fn parameter_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.starts_with([':', '@', '$']) {
        trimmed.to_string()
    } else {
        format!(":{trimmed}")
    }
}

fn wrap_for_paging(query: &RawQuery, order_by: Option<&str>, window: Option<RowWindow>) -> String {
    let order_by = order_by.map(str::trim).filter(|text| !text.is_empty());
    if order_by.is_none() && window.is_none() {
        return query.sql.clone();
    }

    let mut sql = format!("SELECT * FROM ({}) AS paged", query.trimmed_sql());
    if let Some(order_by) = order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    sql.push_str(&translate::window_clause(window));
    sql
}

fn read_dynamic_rows(stmt: &mut Statement<'_>) -> PersistenceResult<Vec<DynamicRow>> {
    let names = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut rows = stmt.raw_query();
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut dynamic = DynamicRow::new();
        for (index, name) in names.iter().enumerate() {
            dynamic.push(name.clone(), row.get::<_, Value>(index)?);
        }
        result.push(dynamic);
    }
    Ok(result)
}

fn scalar_i64(stmt: &mut Statement<'_>) -> PersistenceResult<i64> {
    let mut rows = stmt.raw_query();
    match rows.next()? {
        Some(row) => Ok(row.get::<_, i64>(0)?),
        None => Err(PersistenceError::InvalidData(
            "scalar query returned no row".to_string(),
        )),
    }
}

fn decode_error<E>(err: rusqlite::Error) -> PersistenceError {
    match err {
        rusqlite::Error::InvalidColumnName(column) => PersistenceError::InvalidData(format!(
            "column `{column}` required by {} is missing from the result set",
            entity_name::<E>()
        )),
        other => other.into(),
    }
}
