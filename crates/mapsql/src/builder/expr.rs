//! Expression compiler: one `(column, operator, value)` triple to a SQL
//! fragment plus its positional arguments.
//!
//! Operator dispatch is substring based and checked in this order:
//!
//! - an operator containing `in` (`in`, `not in`) expands one `?` per list element;
//! - an operator containing `between` (`between`, `not between`) binds the
//!   first two list elements;
//! - anything else (`=`, `>`, `!=`, `is`, `like`, ...) binds the value once.
//!
//! Because the match is on substrings, a custom operator that merely contains
//! `in` (say `x in_range`) also takes the list path. That rule is kept as is;
//! callers relying on such operators must pass a list.

use super::params::Where;
use crate::error::BuildError;
use crate::value::Value;

/// A compiled SQL fragment and the arguments for its placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Quote an identifier with backticks, doubling any embedded backtick.
pub fn quote_ident(name: &str) -> Result<String, BuildError> {
    if name.is_empty() {
        return Err(BuildError::EmptyIdentifier);
    }
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Split a where-map key into `(column, operator)`.
///
/// The key is trimmed and split at its first space; a key without a space
/// uses `=`.
pub fn split_key(key: &str) -> (&str, &str) {
    let key = key.trim();
    match key.find(' ') {
        Some(idx) => (&key[..idx], key[idx + 1..].trim()),
        None => (key, "="),
    }
}

/// Compile one comparison into `(`column` op ...)`.
pub fn compile_expr(column: &str, op: &str, value: &Value) -> Result<Fragment, BuildError> {
    let quoted = quote_ident(column)?;

    if op.contains("in") {
        let items = list_operand(column, op, value)?;
        if items.is_empty() {
            return Err(BuildError::EmptyInList {
                column: column.to_string(),
                op: op.to_string(),
            });
        }
        let args = scalar_items(column, items)?;
        let placeholders = vec!["?"; args.len()].join(",");
        Ok(Fragment {
            sql: format!("({quoted} {op} ({placeholders}))"),
            args,
        })
    } else if op.contains("between") {
        let items = list_operand(column, op, value)?;
        if items.len() < 2 {
            return Err(BuildError::BetweenArity {
                column: column.to_string(),
                op: op.to_string(),
                got: items.len(),
            });
        }
        // elements past the second are ignored
        let args = scalar_items(column, &items[..2])?;
        Ok(Fragment {
            sql: format!("({quoted} {op} ? and ?)"),
            args,
        })
    } else {
        if !value.is_scalar() {
            return Err(BuildError::NotScalar {
                column: column.to_string(),
                got: value.kind_name(),
            });
        }
        Ok(Fragment {
            sql: format!("({quoted} {op} ?)"),
            args: vec![value.clone()],
        })
    }
}

/// Compile every entry of `filter` and join them with `and`.
///
/// Directive keys are not special here: callers strip them first.
pub fn compile_where(filter: &Where) -> Result<Fragment, BuildError> {
    let mut parts = Vec::with_capacity(filter.len());
    let mut args = Vec::new();
    for (key, value) in filter {
        let (column, op) = split_key(key);
        let fragment = compile_expr(column, op, value)?;
        parts.push(fragment.sql);
        args.extend(fragment.args);
    }
    Ok(Fragment {
        sql: parts.join(" and "),
        args,
    })
}

fn list_operand<'a>(column: &str, op: &str, value: &'a Value) -> Result<&'a [Value], BuildError> {
    value.as_list().ok_or_else(|| BuildError::SequenceRequired {
        column: column.to_string(),
        op: op.to_string(),
    })
}

fn scalar_items(column: &str, items: &[Value]) -> Result<Vec<Value>, BuildError> {
    items
        .iter()
        .map(|item| {
            if item.is_scalar() {
                Ok(item.clone())
            } else {
                Err(BuildError::NotScalar {
                    column: column.to_string(),
                    got: item.kind_name(),
                })
            }
        })
        .collect()
}
