//! Predicate and statement translation to SQLite SQL.
//!
//! # Invariants
//! - Identifiers are validated, then double-quoted.
//! - Every value becomes a positional `?` parameter.

use super::tracker::TrackedEntry;
use super::{PersistenceError, PersistenceResult};
use crate::model::predicate::{OrderBy, Predicate, TableQuery};
use crate::paging::page_math::RowWindow;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("valid identifier regex")
});

/// Validates and quotes `table` or `table.column`.
pub(crate) fn quote_identifier(name: &str) -> PersistenceResult<String> {
    let trimmed = name.trim();
    if !IDENTIFIER_RE.is_match(trimmed) {
        return Err(PersistenceError::InvalidIdentifier(name.to_string()));
    }
    Ok(trimmed
        .split('.')
        .map(|part| format!("\"{part}\""))
        .collect::<Vec<_>>()
        .join("."))
}

fn quote_list(names: &[&str]) -> PersistenceResult<Vec<String>> {
    names.iter().map(|name| quote_identifier(name)).collect()
}

/// SQL text plus its positional parameters.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Fragment {
    pub sql: String,
    pub params: Vec<Value>,
}

pub(crate) fn where_clause(predicate: Option<&Predicate>) -> PersistenceResult<Fragment> {
    match predicate {
        None => Ok(Fragment::default()),
        Some(predicate) => {
            let mut fragment = Fragment::default();
            fragment.sql.push_str(" WHERE ");
            write_predicate(predicate, &mut fragment)?;
            Ok(fragment)
        }
    }
}

fn write_predicate(predicate: &Predicate, out: &mut Fragment) -> PersistenceResult<()> {
    match predicate {
        Predicate::Compare { column, op, value } => {
            out.sql.push_str(&quote_identifier(column)?);
            out.sql.push(' ');
            out.sql.push_str(op.as_sql());
            out.sql.push_str(" ?");
            out.params.push(value.clone());
        }
        Predicate::IsNull { column, negated } => {
            out.sql.push_str(&quote_identifier(column)?);
            out.sql
                .push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
        }
        Predicate::In { column, values } => {
            if values.is_empty() {
                out.sql.push_str("0 = 1");
                return Ok(());
            }
            out.sql.push_str(&quote_identifier(column)?);
            out.sql.push_str(" IN (");
            out.sql.push_str(&vec!["?"; values.len()].join(", "));
            out.sql.push(')');
            out.params.extend(values.iter().cloned());
        }
        Predicate::And(parts) => write_group(parts, " AND ", "1 = 1", out)?,
        Predicate::Or(parts) => write_group(parts, " OR ", "0 = 1", out)?,
        Predicate::Not(inner) => {
            out.sql.push_str("NOT (");
            write_predicate(inner, out)?;
            out.sql.push(')');
        }
        Predicate::Raw { sql, params } => {
            out.sql.push('(');
            out.sql.push_str(sql);
            out.sql.push(')');
            out.params.extend(params.iter().cloned());
        }
    }
    Ok(())
}

fn write_group(
    parts: &[Predicate],
    separator: &str,
    empty: &str,
    out: &mut Fragment,
) -> PersistenceResult<()> {
    if parts.is_empty() {
        out.sql.push_str(empty);
        return Ok(());
    }
    out.sql.push('(');
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            out.sql.push_str(separator);
        }
        write_predicate(part, out)?;
    }
    out.sql.push(')');
    Ok(())
}

pub(crate) fn order_clause(order: &[OrderBy]) -> PersistenceResult<String> {
    if order.is_empty() {
        return Ok(String::new());
    }
    let terms = order
        .iter()
        .map(|term| {
            quote_identifier(&term.column)
                .map(|column| format!("{column} {}", if term.ascending { "ASC" } else { "DESC" }))
        })
        .collect::<PersistenceResult<Vec<_>>>()?;
    Ok(format!(" ORDER BY {}", terms.join(", ")))
}

pub(crate) fn window_clause(window: Option<RowWindow>) -> String {
    match window {
        Some(window) => format!(" LIMIT {} OFFSET {}", window.limit, window.offset),
        None => String::new(),
    }
}

pub(crate) fn select_sql(
    table: &str,
    columns: &[&str],
    predicate: Option<&Predicate>,
    order: &[OrderBy],
    window: Option<RowWindow>,
) -> PersistenceResult<Fragment> {
    let filter = where_clause(predicate)?;
    let sql = format!(
        "SELECT {} FROM {}{}{}{}",
        quote_list(columns)?.join(", "),
        quote_identifier(table)?,
        filter.sql,
        order_clause(order)?,
        window_clause(window)
    );
    Ok(Fragment {
        sql,
        params: filter.params,
    })
}

pub(crate) fn count_sql(table: &str, predicate: Option<&Predicate>) -> PersistenceResult<Fragment> {
    let filter = where_clause(predicate)?;
    Ok(Fragment {
        sql: format!("SELECT COUNT(*) FROM {}{}", quote_identifier(table)?, filter.sql),
        params: filter.params,
    })
}

pub(crate) fn exists_sql(table: &str, predicate: Option<&Predicate>) -> PersistenceResult<Fragment> {
    let filter = where_clause(predicate)?;
    Ok(Fragment {
        sql: format!(
            "SELECT EXISTS(SELECT 1 FROM {}{})",
            quote_identifier(table)?,
            filter.sql
        ),
        params: filter.params,
    })
}

/// Assembles `SELECT fields FROM table [WHERE ..] [GROUP BY ..]`.
///
/// Ordering is left to the paging wrapper so the total count ignores it.
pub(crate) fn table_query_sql(parts: &TableQuery) -> PersistenceResult<String> {
    let fields = match parts.fields.trim() {
        "" => "*",
        fields => fields,
    };
    let mut sql = format!("SELECT {fields} FROM {}", quote_identifier(&parts.table)?);
    if let Some(filter) = non_blank(parts.filter.as_deref()) {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    if let Some(group_by) = non_blank(parts.group_by.as_deref()) {
        sql.push_str(" GROUP BY ");
        sql.push_str(group_by);
    }
    Ok(sql)
}

fn non_blank(part: Option<&str>) -> Option<&str> {
    part.map(str::trim).filter(|text| !text.is_empty())
}

/// Builds the INSERT/UPDATE/DELETE for one pending tracker entry.
pub(crate) fn entry_statement(entry: &TrackedEntry) -> PersistenceResult<Fragment> {
    use super::EntityState;

    let table = quote_identifier(entry.table)?;
    let key_filter = entry
        .key_columns
        .iter()
        .map(|column| quote_identifier(column).map(|quoted| format!("{quoted} = ?")))
        .collect::<PersistenceResult<Vec<_>>>()?
        .join(" AND ");

    match entry.state {
        EntityState::Added => {
            let columns = quote_list(entry.columns)?;
            Ok(Fragment {
                sql: format!(
                    "INSERT INTO {table} ({}) VALUES ({})",
                    columns.join(", "),
                    vec!["?"; columns.len()].join(", ")
                ),
                params: entry.values.clone(),
            })
        }
        EntityState::Modified => {
            let mut assignments = Vec::new();
            let mut params = Vec::new();
            for (column, value) in entry.columns.iter().zip(&entry.values) {
                if entry.key_columns.contains(column) {
                    continue;
                }
                assignments.push(format!("{} = ?", quote_identifier(column)?));
                params.push(value.clone());
            }
            if assignments.is_empty() {
                return Err(PersistenceError::InvalidData(format!(
                    "entity `{}` has no non-key columns to update",
                    entry.table
                )));
            }
            params.extend(entry.key.iter().cloned());
            Ok(Fragment {
                sql: format!(
                    "UPDATE {table} SET {} WHERE {key_filter}",
                    assignments.join(", ")
                ),
                params,
            })
        }
        EntityState::Removed => Ok(Fragment {
            sql: format!("DELETE FROM {table} WHERE {key_filter}"),
            params: entry.key.clone(),
        }),
        EntityState::Unchanged => Err(PersistenceError::InvalidData(format!(
            "entity `{}` has no pending change",
            entry.table
        ))),
    }
}
