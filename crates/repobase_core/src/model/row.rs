//! Untyped result rows for projected or joined queries.

use rusqlite::types::Value;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Column name to value mapping, in select-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicRow {
    columns: Vec<(String, Value)>,
}

impl DynamicRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push((column.into(), value));
    }

    /// Value of the first column named `column` (case-insensitive).
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        match self.get(column)? {
            Value::Real(value) => Some(*value),
            Value::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        match self.get(column)? {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for DynamicRow {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl Serialize for DynamicRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            match value {
                Value::Null => map.serialize_entry(name, &Option::<()>::None)?,
                Value::Integer(number) => map.serialize_entry(name, number)?,
                Value::Real(number) => map.serialize_entry(name, number)?,
                Value::Text(text) => map.serialize_entry(name, text)?,
                Value::Blob(bytes) => map.serialize_entry(name, bytes)?,
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::DynamicRow;
    use rusqlite::types::Value;

    #[test]
    fn lookup_is_case_insensitive_and_typed() {
        let row: DynamicRow = vec![
            ("Name".to_string(), Value::Text("ana".to_string())),
            ("total".to_string(), Value::Integer(3)),
        ]
        .into_iter()
        .collect();

        assert_eq!(row.get_str("name"), Some("ana"));
        assert_eq!(row.get_i64("TOTAL"), Some(3));
        assert_eq!(row.get_f64("total"), Some(3.0));
        assert_eq!(row.get_i64("missing"), None);
    }

    #[test]
    fn serializes_as_ordered_map() {
        let mut row = DynamicRow::new();
        row.push("city", Value::Text("Lyon".to_string()));
        row.push("note", Value::Null);
        row.push("count", Value::Integer(2));

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"city":"Lyon","note":null,"count":2}"#);
    }
}
