//! Driver-neutral values, their type tags, and typed extraction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};

/// Core value types moved between callers and drivers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl Value {
    /// The type tag naturally describing this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Integer(_) => DataType::Integer,
            Value::Real(_) => DataType::Real,
            Value::Text(_) => DataType::Text,
            Value::Blob(_) => DataType::Blob,
            Value::Boolean(_) => DataType::Boolean,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Fallible conversion into a caller-chosen type.
    pub fn try_into_typed<T: FromValue>(self) -> DbResult<T> {
        T::from_value(self)
    }
}

/// Declared type of a parameter; the provider maps it to its native type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Null,
    Integer,
    Real,
    Text,
    Blob,
    Boolean,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Null => "null",
            DataType::Integer => "integer",
            DataType::Real => "real",
            DataType::Text => "text",
            DataType::Blob => "blob",
            DataType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Blob(value.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Types that can be extracted from a [`Value`] returned by a driver.
///
/// Conversions are strict: a mismatch yields [`DbError::Conversion`] rather
/// than a best-effort cast. Wrap the target in `Option` to accept NULL.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> DbResult<Self>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> DbResult<Self> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Integer(v) => Ok(v),
            Value::Boolean(v) => Ok(v.into()),
            other => Err(DbError::conversion(other.data_type(), "i64")),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Integer(v) => {
                i32::try_from(v).map_err(|_| DbError::conversion(DataType::Integer, "i32"))
            }
            Value::Boolean(v) => Ok(v.into()),
            other => Err(DbError::conversion(other.data_type(), "i32")),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Real(v) => Ok(v),
            Value::Integer(v) => Ok(v as f64),
            other => Err(DbError::conversion(other.data_type(), "f64")),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Boolean(v) => Ok(v),
            Value::Integer(v) => Ok(v != 0),
            other => Err(DbError::conversion(other.data_type(), "bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(DbError::conversion(other.data_type(), "String")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Blob(v) => Ok(v),
            Value::Text(v) => Ok(v.into_bytes()),
            other => Err(DbError::conversion(other.data_type(), "Vec<u8>")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> DbResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
