//! Statement builders: table name + `Where` / `Values` to parameterized SQL.
//!
//! The builders only produce text and arguments; they never touch a database.
//! Output uses `?` placeholders and backtick-quoted identifiers (MySQL/SQLite
//! style), the only dialect supported.
//!
//! ```
//! use mapsql::{builder, where_map};
//!
//! let mut filter = where_map! {
//!     "id between" => vec![2, 5],
//!     "_other" => "ORDER BY id DESC",
//! };
//! let stmt = builder::select("test", &mut filter).unwrap();
//! assert_eq!(
//!     stmt.sql(),
//!     "SELECT * FROM `test` WHERE (`id` between ? and ?) ORDER BY id DESC"
//! );
//! assert_eq!(stmt.args().len(), 2);
//! // directive keys were taken out of the caller's map
//! assert!(!filter.contains_key("_other"));
//! ```

mod expr;
mod format;
mod params;


pub use expr::{Fragment, compile_expr, compile_where, quote_ident, split_key};
pub use format::format_sql;
pub use params::{Values, Where, directive};

use crate::error::BuildError;
use crate::value::Value;

/// A built statement: SQL text plus positional arguments.
///
/// The number of `?` in `sql` always equals `args.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    args: Vec<Value>,
}

impl Statement {
    /// Wrap hand-written SQL and its arguments.
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.args)
    }

    /// Render for logs with [`format_sql`].
    pub fn display_sql(&self) -> String {
        format_sql(&self.sql, &self.args)
    }
}

/// Build `SELECT <field> FROM `table` [WHERE ..] [GROUP BY ..] [HAVING ..] [<other>]`.
///
/// Takes `_field`, `_groupby`, `_having` and `_other` out of `filter` before
/// compiling what is left as the WHERE clause. The caller's map is mutated.
pub fn select(table: &str, filter: &mut Where) -> Result<Statement, BuildError> {
    let field = take_text(filter, directive::FIELD)?;
    let group_by = take_text(filter, directive::GROUP_BY)?;
    let having = take_where(filter, directive::HAVING)?;
    let other = take_text(filter, directive::OTHER)?;

    let field = field
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| "*".to_string());

    let mut sql = format!("SELECT {field} FROM {}", quote_ident(table)?);
    let mut args = Vec::new();

    push_filter(&mut sql, &mut args, " WHERE ", filter)?;

    if let Some(group_by) = group_by.filter(|g| !g.is_empty()) {
        sql.push_str(" GROUP BY ");
        sql.push_str(&group_by);
    }

    if let Some(having) = having {
        push_filter(&mut sql, &mut args, " HAVING ", &having)?;
    }

    push_other(&mut sql, other);
    Ok(Statement { sql, args })
}

/// Build ``INSERT INTO `table`(`a`,`b`) VALUES(?,?)``.
///
/// Columns, placeholders and arguments come out of one pass over `values`, so
/// they always line up.
pub fn insert(table: &str, values: &Values) -> Result<Statement, BuildError> {
    if values.is_empty() {
        return Err(BuildError::EmptyValues {
            statement: "INSERT",
        });
    }

    let mut columns = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    let mut args = Vec::with_capacity(values.len());
    for (column, value) in values {
        columns.push(quote_ident(column)?);
        placeholders.push("?");
        args.push(scalar(column, value)?);
    }

    let sql = format!(
        "INSERT INTO {}({}) VALUES({})",
        quote_ident(table)?,
        columns.join(","),
        placeholders.join(",")
    );
    Ok(Statement { sql, args })
}

/// Build ``UPDATE `table` SET `a`=?,`b`=? [WHERE ..] [<other>]``.
///
/// SET arguments come before WHERE arguments. Only the `_other` directive is
/// accepted; it is taken out of `filter`.
pub fn update(table: &str, values: &Values, filter: &mut Where) -> Result<Statement, BuildError> {
    if values.is_empty() {
        return Err(BuildError::EmptyValues {
            statement: "UPDATE",
        });
    }
    reject_select_directives(filter, "UPDATE")?;
    let other = take_text(filter, directive::OTHER)?;

    let mut assignments = Vec::with_capacity(values.len());
    let mut args = Vec::with_capacity(values.len() + filter.len());
    for (column, value) in values {
        assignments.push(format!("{}=?", quote_ident(column)?));
        args.push(scalar(column, value)?);
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        quote_ident(table)?,
        assignments.join(",")
    );
    push_filter(&mut sql, &mut args, " WHERE ", filter)?;
    push_other(&mut sql, other);
    Ok(Statement { sql, args })
}

/// Build ``DELETE FROM `table` [WHERE ..] [<other>]``.
///
/// An empty filter deletes every row, as written.
pub fn delete(table: &str, filter: &mut Where) -> Result<Statement, BuildError> {
    reject_select_directives(filter, "DELETE")?;
    let other = take_text(filter, directive::OTHER)?;

    let mut sql = format!("DELETE FROM {}", quote_ident(table)?);
    let mut args = Vec::new();
    push_filter(&mut sql, &mut args, " WHERE ", filter)?;
    push_other(&mut sql, other);
    Ok(Statement { sql, args })
}

fn push_filter(
    sql: &mut String,
    args: &mut Vec<Value>,
    keyword: &str,
    filter: &Where,
) -> Result<(), BuildError> {
    let fragment = compile_where(filter)?;
    if !fragment.is_empty() {
        sql.push_str(keyword);
        sql.push_str(&fragment.sql);
        args.extend(fragment.args);
    }
    Ok(())
}

fn push_other(sql: &mut String, other: Option<String>) {
    if let Some(other) = other.filter(|o| !o.is_empty()) {
        sql.push(' ');
        sql.push_str(&other);
    }
}

fn take_text(filter: &mut Where, key: &'static str) -> Result<Option<String>, BuildError> {
    match filter.remove(key) {
        None => Ok(None),
        Some(Value::Text(s)) => Ok(Some(s)),
        Some(other) => Err(BuildError::InvalidDirective {
            key,
            expected: "text",
            got: other.kind_name(),
        }),
    }
}

fn take_where(filter: &mut Where, key: &'static str) -> Result<Option<Where>, BuildError> {
    match filter.remove(key) {
        None => Ok(None),
        Some(Value::Where(w)) => {
            // a nested map only holds conditions
            if let Some(nested) = directive::ALL.into_iter().find(|d| w.contains_key(*d)) {
                return Err(BuildError::InvalidDirective {
                    key,
                    expected: "conditions only",
                    got: nested,
                });
            }
            Ok(Some(w))
        }
        Some(other) => Err(BuildError::InvalidDirective {
            key,
            expected: "where",
            got: other.kind_name(),
        }),
    }
}

fn reject_select_directives(filter: &Where, statement: &'static str) -> Result<(), BuildError> {
    for key in [directive::FIELD, directive::GROUP_BY, directive::HAVING] {
        if filter.contains_key(key) {
            return Err(BuildError::UnsupportedDirective { key, statement });
        }
    }
    Ok(())
}

fn scalar(column: &str, value: &Value) -> Result<Value, BuildError> {
    if value.is_scalar() {
        Ok(value.clone())
    } else {
        Err(BuildError::NotScalar {
            column: column.to_string(),
            got: value.kind_name(),
        })
    }
}
