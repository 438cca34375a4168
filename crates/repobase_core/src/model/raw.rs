//! Raw SQL text plus its parameters.

use rusqlite::types::Value;

/// One bound parameter.
///
/// An empty `name` binds by position (order in the parameter list). Any other
/// name binds by name; a bare `id` is looked up as `:id`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParam {
    pub name: String,
    pub value: Value,
}

impl SqlParam {
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn positional(value: impl Into<Value>) -> Self {
        Self {
            name: String::new(),
            value: value.into(),
        }
    }

    pub fn is_positional(&self) -> bool {
        self.name.is_empty()
    }
}

/// SQL statement forwarded verbatim to the persistence context.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl RawQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push(SqlParam::named(name, value));
        self
    }

    pub fn bind_positional(mut self, value: impl Into<Value>) -> Self {
        self.params.push(SqlParam::positional(value));
        self
    }

    /// SQL text without trailing semicolons, so it can be nested as a subquery.
    pub fn trimmed_sql(&self) -> &str {
        self.sql.trim().trim_end_matches(';').trim_end()
    }
}
