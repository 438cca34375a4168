//! Filter, ordering and query-shape values.
//!
//! # Responsibility
//! - Let callers express row filters without writing SQL.
//! - Carry "already built" queries and string-part queries to paging.
//!
//! # Invariants
//! - Column names are validated by the context at translation time, not here.
//! - Filter values are never interpolated into SQL text.

use crate::model::entity::Entity;
use rusqlite::types::Value;
use std::marker::PhantomData;

/// Comparison operator used by [`Predicate::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
        }
    }
}

/// Boolean filter over one entity set.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Caller-owned SQL fragment with positional `?` parameters.
    Raw {
        sql: String,
        params: Vec<Value>,
    },
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Le, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ge, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::Like, Value::Text(pattern.into()))
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull {
            column: column.into(),
            negated: false,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::IsNull {
            column: column.into(),
            negated: true,
        }
    }

    /// Membership test. An empty list matches nothing.
    pub fn in_list<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self::Raw {
            sql: sql.into(),
            params,
        }
    }

    /// Matches the row identified by `entity`'s primary key.
    pub fn key_of<E: Entity>(entity: &E) -> Self {
        let parts = E::KEY_COLUMNS
            .iter()
            .zip(entity.key_values())
            .map(|(column, value)| Self::eq(*column, value))
            .collect::<Vec<_>>();
        Self::And(parts).flatten()
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Self::Or(mut parts) => {
                parts.push(other);
                Self::Or(parts)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    fn flatten(self) -> Self {
        match self {
            Self::And(mut parts) if parts.len() == 1 => parts.remove(0),
            other => other,
        }
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }
}

/// Pre-built filter and ordering over entity set `T`.
///
/// This is the "queryable" handed to `Repository::page_query`: callers compose
/// it once and page through it repeatedly.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityQuery<T> {
    pub predicate: Option<Predicate>,
    pub order: Vec<OrderBy>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Default for EntityQuery<T> {
    fn default() -> Self {
        Self::all()
    }
}

impl<T> EntityQuery<T> {
    pub fn all() -> Self {
        Self {
            predicate: None,
            order: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Adds a filter; repeated calls are combined with `AND`.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }
}

/// Table/field/filter/order/group query given as SQL fragments.
///
/// `table` must be a plain identifier. The remaining parts are trusted SQL
/// fragments supplied by the calling code, never by end users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableQuery {
    pub table: String,
    /// Select list; blank means `*`.
    pub fields: String,
    pub filter: Option<String>,
    pub order_by: Option<String>,
    pub group_by: Option<String>,
}

impl TableQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = fields.into();
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }
}
