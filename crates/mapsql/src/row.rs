//! Decoded rows and the row-to-struct mapping trait.

use crate::error::{SqlError, SqlResult};
use crate::value::{FromValue, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One result row, decoded into [`Value`]s.
///
/// Column names are shared between all rows of the same result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Pair column names with values by position. A column without a value
    /// reads as absent.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Column names in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the first column with this name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Value at a column index.
    pub fn get_idx(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Typed access, returning [`SqlError::Decode`] on a missing column or a
    /// type mismatch.
    pub fn try_get<T: FromValue>(&self, column: &str) -> SqlResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| SqlError::decode(column, "column not present in result"))?;
        T::from_value(value).map_err(|message| SqlError::decode(column, message))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.columns.iter().cloned().zip(self.values).collect()
    }

    /// Render as a JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Trait for converting a database row into a Rust struct.
///
/// `COLUMNS` is the mapping table: every result column must appear in it,
/// otherwise scanning fails with [`SqlError::UnmatchedColumn`]. This trait
/// should typically be derived using `#[derive(FromRow)]`.
///
/// # Example
///
/// ```ignore
/// use mapsql::FromRow;
///
/// #[derive(FromRow)]
/// struct User {
///     id: i64,
///     #[orm(column = "user_name")]
///     name: String,
///     email: Option<String>,
/// }
/// ```
pub trait FromRow: Sized {
    /// Column names this type accepts.
    const COLUMNS: &'static [&'static str];

    /// Convert a database row into Self
    fn from_row(row: &Row) -> SqlResult<Self>;
}

/// Map one row onto `T`, rejecting result columns `T` has no field for.
pub fn scan_row<T: FromRow>(row: &Row) -> SqlResult<T> {
    if let Some(column) = row.columns().iter().find(|c| !T::COLUMNS.contains(&c.as_str())) {
        return Err(SqlError::UnmatchedColumn {
            column: column.clone(),
            target: std::any::type_name::<T>(),
        });
    }
    T::from_row(row)
}

/// Map every row onto `T`.
pub fn scan_rows<T: FromRow>(rows: &[Row]) -> SqlResult<Vec<T>> {
    rows.iter().map(scan_row::<T>).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Item {
        id: i64,
        name: Option<String>,
    }

    impl FromRow for Item {
        const COLUMNS: &'static [&'static str] = &["id", "name"];

        fn from_row(row: &Row) -> SqlResult<Self> {
            Ok(Self {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            })
        }
    }

    fn row(columns: &[&str], values: Vec<Value>) -> Row {
        let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
        Row::new(columns, values)
    }

    #[test]
    fn scan_matching_columns() {
        let r = row(&["id", "name"], vec![Value::Int(1), Value::Null]);
        assert_eq!(scan_row::<Item>(&r).unwrap(), Item { id: 1, name: None });
    }

    #[test]
    fn short_row_reads_missing_values_as_absent() {
        let r = row(&["id", "name"], vec![Value::Int(1)]);
        assert_eq!(r.get("id"), Some(&Value::Int(1)));
        assert_eq!(r.get("name"), None);
        assert!(r.try_get::<Option<String>>("name").is_err());
    }

    #[test]
    fn unmatched_column_is_an_error() {
        let r = row(&["id", "name", "time"], vec![Value::Int(1), Value::Null, Value::Null]);
        let err = scan_row::<Item>(&r).unwrap_err();
        assert!(matches!(err, SqlError::UnmatchedColumn { ref column, .. } if column == "time"));
    }

    #[test]
    fn missing_column_is_a_decode_error() {
        let r = row(&["id"], vec![Value::Int(1)]);
        let err = scan_row::<Item>(&r).unwrap_err();
        assert!(matches!(err, SqlError::Decode { ref column, .. } if column == "name"));
    }

    #[test]
    fn type_mismatch_is_a_decode_error() {
        let r = row(&["id", "name"], vec![Value::Text("x".into()), Value::Null]);
        assert!(matches!(
            scan_row::<Item>(&r).unwrap_err(),
            SqlError::Decode { .. }
        ));
    }

    #[test]
    fn row_to_json() {
        let r = row(&["id", "name"], vec![Value::Int(3), Value::Text("c".into())]);
        assert_eq!(r.to_json(), serde_json::json!({ "id": 3, "name": "c" }));
    }
}
