//! Runtime values carried by field trees and returned in decode results.

use std::collections::HashMap;

/// A single field value (scalar leaf or compiled subtree).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I64(i64),
    Bool(bool),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    Struct(HashMap<String, Value>),
    List(Vec<Value>),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(x) => Some(*x as u64),
            Value::U16(x) => Some(*x as u64),
            Value::U32(x) => Some(*x as u64),
            Value::U64(x) => Some(*x),
            Value::I64(x) if *x >= 0 => Some(*x as u64),
            Value::Bool(b) => Some(*b as u64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(x) => Some(*x),
            Value::U8(x) => Some(*x as i64),
            Value::U16(x) => Some(*x as i64),
            Value::U32(x) => Some(*x as i64),
            Value::U64(x) => i64::try_from(*x).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::U8(0) | Value::U16(0) | Value::U32(0) | Value::U64(0) | Value::I64(0) => Some(false),
            Value::U8(1) | Value::U16(1) | Value::U32(1) | Value::U64(1) | Value::I64(1) => Some(true),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Struct(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(x) => Some(*x),
            other => other.as_i64().map(|x| x as f64),
        }
    }

    /// Field lookup in a struct value by dotted path (`"tclass.dscp"`).
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .filter(|s| !s.is_empty())
            .try_fold(self, |v, key| v.as_struct()?.get(key))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Value::Struct(_))
    }
}

impl From<u8> for Value {
    fn from(x: u8) -> Self {
        Value::U8(x)
    }
}

impl From<u16> for Value {
    fn from(x: u16) -> Self {
        Value::U16(x)
    }
}

impl From<u32> for Value {
    fn from(x: u32) -> Self {
        Value::U32(x)
    }
}

impl From<u64> for Value {
    fn from(x: u64) -> Self {
        Value::U64(x)
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::I64(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(m: HashMap<String, Value>) -> Self {
        Value::Struct(m)
    }
}

/// Build a `Value::Struct` from `(key, value)` pairs.
///
/// ```
/// use layercodec::value::{object, Value};
/// let v = object([("srcport", Value::U16(53)), ("dstport", Value::U16(1024))]);
/// assert_eq!(v.get_path("srcport"), Some(&Value::U16(53)));
/// ```
pub fn object<K, I>(pairs: I) -> Value
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    Value::Struct(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
}
