//! Types module: the document model the matcher reads from and parses predicates out of.
//!
//! This module provides the Value, ValueType, Binary and Document types, plus the `doc!` macro.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ValueType {
    Null,
    Bool,
    Int,
    Double,
    String,
    Binary,
    Array,
    Document,
}

impl ValueType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Int | ValueType::Double)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::Binary => "binData",
            ValueType::Array => "array",
            ValueType::Document => "object",
        };
        f.write_str(name)
    }
}

/// Opaque binary data. The subtype is carried along but never consulted by bit tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binary {
    pub subtype: u8,
    pub bytes: Vec<u8>,
}

impl Binary {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { subtype: 0, bytes: bytes.into() }
    }

    pub fn with_subtype(subtype: u8, bytes: impl Into<Vec<u8>>) -> Self {
        Self { subtype, bytes: bytes.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Binary(Binary),
    Array(Vec<Value>),
    Document(Document),
}

impl Value {
    pub fn get_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Binary(_) => ValueType::Binary,
            Value::Array(_) => ValueType::Array,
            Value::Document(_) => ValueType::Document,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Numeric view used by comparison operators. Ints wider than 2^53 lose precision here.
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Binary(bin) => {
                write!(f, "BinData({}, ", bin.subtype)?;
                for byte in &bin.bytes {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str(")")
            }
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Document(doc) => write!(f, "{doc}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
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

impl From<Binary> for Value {
    fn from(v: Binary) -> Self {
        Value::Binary(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

/// An ordered set of named fields. Later inserts of an existing name replace the earlier value
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " {k}: {v}")?;
        }
        if !self.fields.is_empty() {
            f.write_str(" ")?;
        }
        f.write_str("}")
    }
}

/// Builds a [`Document`] from `"name" => value` pairs.
///
/// ```
/// use bitfilter::{doc, Value};
/// let d = doc! { "a" => 54, "b" => doc! { "$bitsAllSet" => vec![1, 2] } };
/// assert_eq!(d.get("a"), Some(&Value::Int(54)));
/// ```
#[macro_export]
macro_rules! doc {
    () => { $crate::Document::new() };
    ($( $name:expr => $value:expr ),+ $(,)?) => {{
        let mut d = $crate::Document::new();
        $( d.insert($name, $value); )+
        d
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json;

    #[test]
    fn test_value_get_type() {
        assert_eq!(Value::Int(1).get_type(), ValueType::Int);
        assert_eq!(Value::Double(1.5).get_type(), ValueType::Double);
        assert_eq!(Value::from("x").get_type(), ValueType::String);
        assert_eq!(Value::Binary(Binary::new(vec![1])).get_type(), ValueType::Binary);
        assert_eq!(Value::from(vec![1, 2]).get_type(), ValueType::Array);
        assert_eq!(Value::from(doc! {}).get_type(), ValueType::Document);
        assert!(ValueType::Int.is_numeric());
        assert!(!ValueType::Binary.is_numeric());
    }

    #[test]
    fn test_document_insert_replaces_in_place() {
        let mut d = doc! { "a" => 1, "b" => 2 };
        d.insert("a", 3);
        let names: Vec<_> = d.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(d.get("a"), Some(&Value::Int(3)));
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn test_display() {
        let d = doc! { "a" => vec![1, 2], "b" => Binary::new(vec![0x00, 0xff]) };
        assert_eq!(d.to_string(), "{ a: [1, 2], b: BinData(0, 00ff) }");
        assert_eq!(doc! {}.to_string(), "{}");
    }

    #[test]
    fn test_serialization_deserialization() {
        let val = Value::Array(vec![
            Value::Int(1),
            Value::Binary(Binary::with_subtype(4, vec![1, 2, 3])),
            Value::Bool(false),
            Value::Document(doc! { "x" => "y" }),
        ]);
        let json = serde_json::to_string(&val).unwrap();
        let deser: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(val, deser);
    }
}
