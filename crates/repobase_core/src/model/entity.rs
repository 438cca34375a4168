//! Entity capability trait.
//!
//! # Invariants
//! - `COLUMNS` contains every `KEY_COLUMNS` entry.
//! - `to_values()` returns exactly one value per `COLUMNS` entry, same order.

use rusqlite::types::Value;
use rusqlite::Row;

/// Record type persisted through a repository.
///
/// Implementors describe their table shape; the repository never looks at
/// fields directly.
///
/// ```
/// use repobase_core::Entity;
/// use rusqlite::types::Value;
///
/// struct Tag {
///     id: i64,
///     name: String,
/// }
///
/// impl Entity for Tag {
///     const TABLE: &'static str = "tags";
///     const KEY_COLUMNS: &'static [&'static str] = &["id"];
///     const COLUMNS: &'static [&'static str] = &["id", "name"];
///
///     fn to_values(&self) -> Vec<Value> {
///         vec![Value::Integer(self.id), Value::Text(self.name.clone())]
///     }
///
///     fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
///         Ok(Self { id: row.get("id")?, name: row.get("name")? })
///     }
/// }
/// ```
pub trait Entity: Sized {
    /// Backing table name.
    const TABLE: &'static str;
    /// Primary key columns; together they identify one row.
    const KEY_COLUMNS: &'static [&'static str];
    /// All persisted columns, keys included.
    const COLUMNS: &'static [&'static str];

    /// Column values in `COLUMNS` order.
    fn to_values(&self) -> Vec<Value>;

    /// Builds an entity from a row selected with `COLUMNS`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Primary key values in `KEY_COLUMNS` order.
    fn key_values(&self) -> Vec<Value> {
        let values = self.to_values();
        let key = Self::KEY_COLUMNS
            .iter()
            .filter_map(|key| Self::COLUMNS.iter().position(|column| column == key))
            .filter_map(|index| values.get(index).cloned())
            .collect::<Vec<_>>();
        debug_assert_eq!(
            key.len(),
            Self::KEY_COLUMNS.len(),
            "every KEY_COLUMNS entry of `{}` must appear in COLUMNS and to_values()",
            Self::TABLE
        );
        key
    }
}

/// Short type name used in logs and error context.
pub(crate) fn entity_name<E>() -> &'static str {
    let full = std::any::type_name::<E>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::{entity_name, Entity};
    use rusqlite::types::Value;
    use rusqlite::Row;

    struct Membership {
        team: String,
        user: String,
        role: String,
    }

    impl Entity for Membership {
        const TABLE: &'static str = "memberships";
        const KEY_COLUMNS: &'static [&'static str] = &["team", "user"];
        const COLUMNS: &'static [&'static str] = &["role", "user", "team"];

        fn to_values(&self) -> Vec<Value> {
            vec![
                Value::Text(self.role.clone()),
                Value::Text(self.user.clone()),
                Value::Text(self.team.clone()),
            ]
        }

        fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Self {
                team: row.get("team")?,
                user: row.get("user")?,
                role: row.get("role")?,
            })
        }
    }

    #[test]
    fn key_values_follow_key_column_order() {
        let membership = Membership {
            team: "core".to_string(),
            user: "ana".to_string(),
            role: "owner".to_string(),
        };

        assert_eq!(
            membership.key_values(),
            vec![Value::Text("core".to_string()), Value::Text("ana".to_string())]
        );
    }

    #[test]
    fn entity_name_strips_module_path() {
        assert_eq!(entity_name::<Membership>(), "Membership");
    }

    struct Misdeclared;

    impl Entity for Misdeclared {
        const TABLE: &'static str = "misdeclared";
        const KEY_COLUMNS: &'static [&'static str] = &["id"];
        const COLUMNS: &'static [&'static str] = &["name"];

        fn to_values(&self) -> Vec<Value> {
            vec![Value::Text("x".to_string())]
        }

        fn from_row(_row: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Self)
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "must appear in COLUMNS")]
    fn key_column_missing_from_columns_is_caught() {
        let _ = Misdeclared.key_values();
    }
}
