//! `Where` / `Values` maps consumed by the statement builders.

use crate::value::Value;
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Reserved `Where` keys that shape the statement instead of filtering rows.
pub mod directive {
    /// Column list for SELECT (default `*`). Text.
    pub const FIELD: &str = "_field";
    /// GROUP BY expression. Text.
    pub const GROUP_BY: &str = "_groupby";
    /// HAVING filter. A nested `Where`.
    pub const HAVING: &str = "_having";
    /// Raw trailing clause (`ORDER BY`, `LIMIT`, ...), appended verbatim. Text.
    pub const OTHER: &str = "_other";

    /// All reserved keys.
    pub const ALL: [&str; 4] = [FIELD, GROUP_BY, HAVING, OTHER];

    /// Whether `key` is one of the reserved directive keys.
    pub fn is_directive(key: &str) -> bool {
        ALL.contains(&key)
    }
}

/// Filter map compiled into a WHERE (or HAVING) clause.
///
/// Keys are either a bare column (`"id"`, operator `=`) or
/// `"<column> <operator>"` (`"id >"`, `"id not in"`, `"name between"`).
/// Entries are kept sorted by key, so the generated SQL is stable.
///
/// ```
/// use mapsql::where_map;
///
/// let w = where_map! {
///     "id >" => 3,
///     "name in" => vec!["a", "b"],
///     "_other" => "ORDER BY id",
/// };
/// assert_eq!(w.len(), 3);
/// assert_eq!(w.filter_count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where(BTreeMap<String, Value>);

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert an entry, returning the previous value for this key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of entries that are filters (not directive keys).
    pub fn filter_count(&self) -> usize {
        self.0
            .keys()
            .filter(|k| !directive::is_directive(k))
            .count()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Where {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Where {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Column -> value map compiled into an INSERT column list or UPDATE SET clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values(BTreeMap<String, Value>);

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(column.into(), value.into())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Values {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Values {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build a [`Where`] from `key => value` pairs.
#[macro_export]
macro_rules! where_map {
    () => {
        $crate::Where::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut __mapsql_where = $crate::Where::new();
        $( __mapsql_where.insert($key, $value); )+
        __mapsql_where
    }};
}

/// Build a [`Values`] from `column => value` pairs.
#[macro_export]
macro_rules! values {
    () => {
        $crate::Values::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {{
        let mut __mapsql_values = $crate::Values::new();
        $( __mapsql_values.insert($column, $value); )+
        __mapsql_values
    }};
}
