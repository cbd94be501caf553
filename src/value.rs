use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Maximum number of [`LogValuer::log_value`] calls performed while
/// resolving a single value.
const MAX_RESOLVE_DEPTH: usize = 100;

/// Discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Any,
    Bool,
    Duration,
    Float64,
    Int64,
    String,
    Time,
    Uint64,
    Group,
    LogValuer,
}

/// A value whose loggable form is computed when the record is handled.
///
/// Useful for expensive values that should only be built if the record
/// actually passes the level gate, or for redacting secrets.
pub trait LogValuer: Send + Sync {
    fn log_value(&self) -> Value;
}

/// Typed payload of an [`Attr`].
#[derive(Clone)]
pub enum Value {
    /// Opaque value, already converted to its JSON form.
    Any(serde_json::Value),
    Bool(bool),
    Duration(Duration),
    Float64(f64),
    Int64(i64),
    String(String),
    Time(DateTime<Utc>),
    Uint64(u64),
    /// Ordered members of a group.
    Group(Vec<Attr>),
    /// Lazily computed value, see [`Value::resolve`].
    LogValuer(Arc<dyn LogValuer>),
}

impl Value {
    /// Build an opaque value from anything serializable.
    ///
    /// Serialization happens eagerly. If it fails the value becomes a
    /// string describing the error so the record is still written.
    pub fn any<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Value::Any(v),
            Err(e) => Value::Any(serde_json::Value::String(format!("marshaling error: {}", e))),
        }
    }

    pub fn group(attrs: impl IntoIterator<Item = Attr>) -> Self {
        Value::Group(attrs.into_iter().collect())
    }

    pub fn valuer(v: impl LogValuer + 'static) -> Self {
        Value::LogValuer(Arc::new(v))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Any(_) => Kind::Any,
            Value::Bool(_) => Kind::Bool,
            Value::Duration(_) => Kind::Duration,
            Value::Float64(_) => Kind::Float64,
            Value::Int64(_) => Kind::Int64,
            Value::String(_) => Kind::String,
            Value::Time(_) => Kind::Time,
            Value::Uint64(_) => Kind::Uint64,
            Value::Group(_) => Kind::Group,
            Value::LogValuer(_) => Kind::LogValuer,
        }
    }

    /// Whether this is the zero value (an opaque `null`).
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Any(serde_json::Value::Null))
    }

    /// Repeatedly call [`LogValuer::log_value`] until the value is no
    /// longer lazy.
    ///
    /// Group members are not resolved here; handlers resolve them as they
    /// walk the group. A valuer chain longer than 100 steps resolves to a
    /// string describing the loop.
    pub fn resolve(&self) -> Value {
        let mut current = self.clone();
        for _ in 0..MAX_RESOLVE_DEPTH {
            match current {
                Value::LogValuer(v) => current = v.log_value(),
                other => return other,
            }
        }
        match current {
            Value::LogValuer(_) => Value::String(format!(
                "LogValue called too many times ({} calls)",
                MAX_RESOLVE_DEPTH
            )),
            other => other,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Any(serde_json::Value::Null)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Any(v) => write!(f, "Any({})", v),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::Duration(v) => write!(f, "Duration({:?})", v),
            Value::Float64(v) => write!(f, "Float64({})", v),
            Value::Int64(v) => write!(f, "Int64({})", v),
            Value::String(v) => write!(f, "String({:?})", v),
            Value::Time(v) => write!(f, "Time({})", v.to_rfc3339()),
            Value::Uint64(v) => write!(f, "Uint64({})", v),
            Value::Group(v) => f.debug_tuple("Group").field(v).finish(),
            Value::LogValuer(_) => f.write_str("LogValuer(..)"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float64(v as f64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint64(v as u64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Uint64(v as u64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Any(v)
    }
}

/// A key/value pair attached to a record or handler.
///
/// `Attr::default()` (empty key, nil value) is the "nothing to log"
/// sentinel and is dropped by handlers.
#[derive(Debug, Clone, Default)]
pub struct Attr {
    pub key: String,
    pub value: Value,
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Attr { key: key.into(), value: value.into() }
    }

    pub fn any<T: Serialize + ?Sized>(key: impl Into<String>, value: &T) -> Self {
        Attr { key: key.into(), value: Value::any(value) }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Attr { key: key.into(), value: Value::String(value.into()) }
    }

    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Attr { key: key.into(), value: Value::Int64(value) }
    }

    pub fn uint(key: impl Into<String>, value: u64) -> Self {
        Attr { key: key.into(), value: Value::Uint64(value) }
    }

    pub fn float(key: impl Into<String>, value: f64) -> Self {
        Attr { key: key.into(), value: Value::Float64(value) }
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Attr { key: key.into(), value: Value::Bool(value) }
    }

    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        Attr { key: key.into(), value: Value::Duration(value) }
    }

    pub fn time(key: impl Into<String>, value: DateTime<Utc>) -> Self {
        Attr { key: key.into(), value: Value::Time(value) }
    }

    /// Group `attrs` under `key`. An empty key inlines the members into
    /// the enclosing scope.
    pub fn group(key: impl Into<String>, attrs: impl IntoIterator<Item = Attr>) -> Self {
        Attr { key: key.into(), value: Value::group(attrs) }
    }

    pub fn valuer(key: impl Into<String>, v: impl LogValuer + 'static) -> Self {
        Attr { key: key.into(), value: Value::valuer(v) }
    }

    /// Whether this is the zero sentinel attribute.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.value.is_nil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Redacted;

    impl LogValuer for Redacted {
        fn log_value(&self) -> Value {
            Value::from("REDACTED")
        }
    }

    struct Forever;

    impl LogValuer for Forever {
        fn log_value(&self) -> Value {
            Value::valuer(Forever)
        }
    }

    #[test]
    fn test_default_attr_is_sentinel() {
        assert!(Attr::default().is_empty());
        assert!(!Attr::new("", "x").is_empty());
        assert!(!Attr::any("k", &serde_json::Value::Null).is_empty());
    }

    #[test]
    fn test_kind_dispatch() {
        assert_eq!(Value::from(1i32).kind(), Kind::Int64);
        assert_eq!(Value::from(1u32).kind(), Kind::Uint64);
        assert_eq!(Value::from("s").kind(), Kind::String);
        assert_eq!(Value::from(Duration::from_secs(1)).kind(), Kind::Duration);
        assert_eq!(Value::group(vec![]).kind(), Kind::Group);
        assert_eq!(Value::valuer(Redacted).kind(), Kind::LogValuer);
        assert_eq!(Value::default().kind(), Kind::Any);
    }

    #[test]
    fn test_resolve_valuer() {
        match Value::valuer(Redacted).resolve() {
            Value::String(s) => assert_eq!(s, "REDACTED"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_resolve_stops_on_cycle() {
        match Value::valuer(Forever).resolve() {
            Value::String(s) => assert!(s.contains("too many times")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_any_marshaling_error() {
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], 1);
        match Value::any(&map) {
            Value::Any(serde_json::Value::String(s)) => assert!(s.starts_with("marshaling error")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
