//! Human-readable rendering of a parameterized statement for log lines.

use crate::value::Value;

/// Substitute each `?` in `query` with its bracketed argument.
///
/// This is for diagnostics only: values are not escaped or quoted and the
/// output is not valid SQL in general. If the number of `?` does not match
/// the number of arguments the query is returned unchanged.
///
/// ```
/// use mapsql::{Value, format_sql};
///
/// let shown = format_sql("SELECT * FROM `t` WHERE (`id` = ?)", &[Value::Int(7)]);
/// assert_eq!(shown, "SELECT * FROM `t` WHERE (`id` = [7])");
/// ```
pub fn format_sql(query: &str, args: &[Value]) -> String {
    if args.is_empty() {
        return query.to_string();
    }

    let placeholders = query.matches('?').count();
    if placeholders != args.len() {
        tracing::warn!(
            target: "mapsql.sql",
            placeholders,
            args = args.len(),
            sql = query,
            "placeholder count does not match argument count"
        );
        return query.to_string();
    }

    let mut out = String::with_capacity(query.len() + args.len() * 8);
    let mut args = args.iter();
    for ch in query.chars() {
        if ch != '?' {
            out.push(ch);
        } else if let Some(arg) = args.next() {
            out.push('[');
            out.push_str(&arg.to_string());
            out.push(']');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_args_returns_query() {
        assert_eq!(format_sql("SELECT 1", &[]), "SELECT 1");
    }

    #[test]
    fn mismatch_returns_query_unmodified() {
        let q = "select ? from t";
        assert_eq!(format_sql(q, &[Value::Int(1), Value::Int(2)]), q);
    }

    #[test]
    fn substitutes_in_order() {
        let shown = format_sql(
            "UPDATE `t` SET `name`=? WHERE (`id` between ? and ?)",
            &[Value::Text("bob".into()), Value::Int(1), Value::Null],
        );
        assert_eq!(
            shown,
            "UPDATE `t` SET `name`=[bob] WHERE (`id` between [1] and [NULL])"
        );
    }
}
