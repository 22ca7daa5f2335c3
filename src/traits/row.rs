//! Row, value and parameter types shared by all backends.
//!
//! This module contains:
//! - `Value` - A decoded column value
//! - `Cell` / `Row` - Result rows as ordered column name to value mappings
//! - `Param` - A positional parameter bound to a prepared query
//! - `LargeObject` - Binary payload bound as BLOB/BYTEA

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A decoded column value.
///
/// Temporal, DECIMAL, UUID and JSON columns decode to `Text` in their
/// textual form; binary columns decode to owned `Bytes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// NULL value
    Null,
    Bool(bool),
    /// Signed integer of any width
    Int(i64),
    /// Unsigned integer (MySQL UNSIGNED columns)
    UInt(u64),
    Float(f64),
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),
}

impl Value {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert this value to a display string
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(v) => v.to_string(),
            Value::UInt(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => format!("\\x{}", hex::encode(b)),
        }
    }

    /// Plain JSON rendering; bytes become a hex string
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::from(*b),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::UInt(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Value::from(*v),
            Value::Text(s) => serde_json::Value::from(s.as_str()),
            Value::Bytes(b) => serde_json::Value::from(hex::encode(b)),
        }
    }

    /// Try to extract as a boolean. Integer 0/1 counts as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(0) | Value::UInt(0) => Some(false),
            Value::Int(1) | Value::UInt(1) => Some(true),
            _ => None,
        }
    }

    /// Try to extract as an i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to extract as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to extract as bytes reference
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

/// One column of a result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Column name as reported by the server
    pub name: String,
    pub value: Value,
}

impl Cell {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Check if this cell is NULL
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

/// A result row: column name to value, in select-list order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Get the number of cells in this row
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if this row is empty
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Value of the first column named `name`
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.cells.iter().find(|c| c.name == name).map(|c| &c.value)
    }

    /// Get a value by position
    pub fn get_value(&self, index: usize) -> Option<&Value> {
        self.cells.get(index).map(|c| &c.value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|c| c.name.as_str())
    }

    /// JSON object keyed by column name
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .cells
            .iter()
            .map(|c| (c.name.clone(), c.value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl IntoIterator for Row {
    type Item = Cell;
    type IntoIter = std::vec::IntoIter<Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Cell;
    type IntoIter = std::slice::Iter<'a, Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}

/// Binary payload bound as BLOB (MySQL, SQLite) or BYTEA (PostgreSQL)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LargeObject(Bytes);

impl LargeObject {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Drain a reader into a large object
    pub fn from_reader(mut reader: impl std::io::Read) -> std::io::Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(Self(Bytes::from(buf)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// A positional parameter for a prepared query
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    LargeObject(LargeObject),
}

impl Param {
    /// Integer form used on backends without a boolean bind type
    pub(crate) fn bool_as_int(b: bool) -> i64 {
        i64::from(b)
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Int(i64::from(v))
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<LargeObject> for Param {
    fn from(v: LargeObject) -> Self {
        Param::LargeObject(v)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Param::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display_string() {
        assert_eq!(Value::Null.to_display_string(), "NULL");
        assert_eq!(Value::Bool(false).to_display_string(), "false");
        assert_eq!(Value::Int(-123).to_display_string(), "-123");
        assert_eq!(Value::UInt(u64::MAX).to_display_string(), "18446744073709551615");
        assert_eq!(Value::Text("hello".to_string()).to_display_string(), "hello");
    }

    #[test]
    fn test_value_bytes_display() {
        let bytes = Value::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(bytes.to_display_string(), "\\xdeadbeef");
        assert_eq!(bytes.to_json(), serde_json::json!("deadbeef"));
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Int(1).as_bool(), Some(true));
        assert_eq!(Value::Int(2).as_bool(), None);
        assert_eq!(Value::UInt(7).as_i64(), Some(7));
        assert_eq!(Value::UInt(u64::MAX).as_i64(), None);
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Text("ab".into()).as_bytes(), Some(&b"ab"[..]));
    }

    #[test]
    fn test_row_lookup_by_name() {
        let row = Row::new(vec![
            Cell::new("id", Value::Int(1)),
            Cell::new("username", Value::Text("john".to_string())),
            Cell::new("birthdate", Value::Null),
        ]);

        assert_eq!(row.len(), 3);
        assert_eq!(row.get("username"), Some(&Value::Text("john".to_string())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_value(2), Some(&Value::Null));
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "username", "birthdate"]);
        assert_eq!(
            row.to_json(),
            serde_json::json!({"id": 1, "username": "john", "birthdate": null})
        );
    }

    #[test]
    fn test_param_from_option() {
        assert_eq!(Param::from(Some(42i32)), Param::Int(42));
        assert_eq!(Param::from(Option::<&str>::None), Param::Null);
        assert_eq!(Param::from("x"), Param::Text("x".to_string()));
        assert_eq!(Param::bool_as_int(true), 1);
        assert_eq!(Param::bool_as_int(false), 0);
    }

    #[test]
    fn test_large_object_from_reader() {
        let payload: &[u8] = &[0xff, 0x00, 0xfe, 0x80];
        let lob = LargeObject::from_reader(payload).unwrap();
        assert_eq!(lob.as_bytes(), payload);
        assert_eq!(lob.len(), 4);
    }
}
