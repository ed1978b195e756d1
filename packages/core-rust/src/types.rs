use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Generic runtime value stored in a backing-store entry.
///
/// Supports all JSON-compatible types. Serialized untagged so a stored
/// [`Document`] is plain JSON on the wire and in fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON null. Treated as "absent" by decoders and as "delete this field"
    /// by merge updates.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer (signed 64-bit).
    Int(i64),
    /// JSON floating-point (64-bit IEEE 754).
    Float(f64),
    /// JSON string (UTF-8).
    String(String),
    /// JSON array (ordered sequence of values).
    Array(Vec<Value>),
    /// JSON object. Uses `BTreeMap` for deterministic serialization order.
    Map(BTreeMap<String, Value>),
}

/// A flat map of field name to value: the shape of one top-level entry.
pub type Document = BTreeMap<String, Value>;

impl Value {
    /// Returns the string slice if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the inner map if this is a `Map`.
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Whether this value is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::Array(_) | Self::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Self::Map(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_plain_json() {
        let value: Value =
            serde_json::from_str(r#"{"age":30,"name":"Ana","score":1.5,"tags":["a"],"x":null}"#)
                .unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map["age"], Value::Int(30));
        assert_eq!(map["name"], Value::String("Ana".to_string()));
        assert_eq!(map["score"], Value::Float(1.5));
        assert_eq!(map["tags"], Value::Array(vec![Value::from("a")]));
        assert!(map["x"].is_null());
    }

    #[test]
    fn serializes_untagged() {
        let mut doc = Document::new();
        doc.insert("age".to_string(), Value::from(31_u32));
        doc.insert("name".to_string(), Value::from("Ana"));
        let json = serde_json::to_string(&Value::from(doc)).unwrap();
        assert_eq!(json, r#"{"age":31,"name":"Ana"}"#);
    }

    #[test]
    fn display_scalars_and_nested() {
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::from("abc").to_string(), "abc");
        assert_eq!(Value::Array(vec![Value::Int(1)]).to_string(), "[1]");
    }
}
