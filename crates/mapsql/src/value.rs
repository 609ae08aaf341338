//! Loosely typed values used for filters, assignments, bound arguments and
//! decoded columns.

use crate::builder::Where;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;

/// Text layout used when a timestamp is bound or printed.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A dynamically typed SQL value.
///
/// `List` is the sequence form consumed by the `in` / `between` operators and
/// `Where` only exists so that the `_having` directive can nest a filter map.
/// Neither can be bound as a single argument.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    List(Vec<Value>),
    Where(Where),
}

impl Value {
    /// Wrap raw bytes (`Vec<u8>` converts into a `List` of integers otherwise).
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Where(_) => "where",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value can be bound to a single `?`.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::List(_) | Value::Where(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Where(w) => {
                f.write_str("{")?;
                for (i, (k, v)) in w.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Timestamp(ts) => {
                serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
            }
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Where(w) => {
                let mut map = serializer.serialize_map(Some(w.len()))?;
                for (k, v) in w.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(v: DateTime<Tz>) -> Self {
        Value::Timestamp(v.naive_utc())
    }
}

impl From<Where> for Value {
    fn from(v: Where) -> Self {
        Value::Where(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(v: &[T]) -> Self {
        Value::List(v.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(v: [T; N]) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Conversion from a decoded [`Value`] into a Rust type.
///
/// Used by [`Row::try_get`](crate::Row::try_get) and the `FromRow` derive.
pub trait FromValue: Sized {
    /// Convert, returning a human readable reason on mismatch.
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn mismatch(expected: &str, value: &Value) -> String {
    format!("expected {expected}, got {}", value.kind_name())
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            // SQLite and MySQL store booleans as integers
            Value::Int(i) => Ok(*i != 0),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => Ok(*i),
            other => Err(mismatch("int", other)),
        }
    }
}

macro_rules! impl_from_value_narrow_int {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> Result<Self, String> {
                    let wide = i64::from_value(value)?;
                    <$t>::try_from(wide)
                        .map_err(|_| format!("{wide} out of range for {}", stringify!($t)))
                }
            }
        )*
    };
}

impl_from_value_narrow_int!(i8, i16, i32, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(x) => Ok(*x),
            Value::Int(i) => Ok(*i as f64),
            other => Err(mismatch("float", other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        f64::from_value(value).map(|x| x as f32)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone()).map_err(|e| e.to_string()),
            other => Err(mismatch("text", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.clone().into_bytes()),
            other => Err(mismatch("bytes", other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Timestamp(ts) => Ok(*ts),
            Value::Text(s) => parse_timestamp(s),
            other => Err(mismatch("timestamp", other)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(s) if s.len() == 10 => {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string())
            }
            other => NaiveDateTime::from_value(other).map(|ts| ts.date()),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Parse the timestamp layouts SQLite and MySQL hand back as text.
fn parse_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    const LAYOUTS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];
    for layout in LAYOUTS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, layout) {
            return Ok(ts);
        }
    }
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.naive_utc())
        .map_err(|_| format!("unrecognised timestamp '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_converts_to_list() {
        let v = Value::from(vec![1, 2, 3]);
        assert_eq!(
            v,
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert!(!v.is_scalar());
    }

    #[test]
    fn option_none_is_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }

    #[test]
    fn display_list_and_null() {
        let v = Value::from(vec![Value::Int(1), Value::Null]);
        assert_eq!(v.to_string(), "[1, NULL]");
    }

    #[test]
    fn narrow_int_out_of_range() {
        let err = i8::from_value(&Value::Int(300)).unwrap_err();
        assert!(err.contains("out of range"));
        assert_eq!(i32::from_value(&Value::Int(7)).unwrap(), 7);
    }

    #[test]
    fn bool_from_int() {
        assert!(bool::from_value(&Value::Int(1)).unwrap());
        assert!(!bool::from_value(&Value::Int(0)).unwrap());
    }

    #[test]
    fn timestamp_from_text() {
        let ts = NaiveDateTime::from_value(&Value::Text("2024-03-01 12:30:00".into())).unwrap();
        assert_eq!(ts.to_string(), "2024-03-01 12:30:00");
        assert!(NaiveDateTime::from_value(&Value::Text("yesterday".into())).is_err());
    }

    #[test]
    fn option_wraps_mismatch() {
        assert_eq!(Option::<i64>::from_value(&Value::Null).unwrap(), None);
        assert!(Option::<i64>::from_value(&Value::Text("a".into())).is_err());
    }

    #[test]
    fn serialize_to_json() {
        let v = Value::from(vec![Value::Int(1), Value::Text("a".into()), Value::Null]);
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"[1,"a",null]"#);
    }
}
