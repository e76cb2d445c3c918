//! Result rows returned by select queries.

use std::ops::Index;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{DbError, DbResult};
use crate::value::{FromValue, Value};

/// One result row exposed as a column name -> value mapping.
///
/// Column names are shared between all rows of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSet {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl ValueSet {
    /// Build a row; `values` must line up with `columns`.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    /// Value of `column`, or a lookup error if the row has no such column.
    pub fn get(&self, column: &str) -> DbResult<&Value> {
        self.position(column)
            .map(|i| &self.values[i])
            .ok_or_else(|| DbError::ColumnNotFound(column.to_string()))
    }

    /// Value of `column` converted to `T`.
    pub fn get_as<T: FromValue>(&self, column: &str) -> DbResult<T> {
        T::from_value(self.get(column)?.clone())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// Map-style access by column name.
///
/// # Panics
///
/// Panics if the row has no such column. Use [`ValueSet::get`] to get a
/// [`DbError::ColumnNotFound`] instead.
impl Index<&str> for ValueSet {
    type Output = Value;

    fn index(&self, column: &str) -> &Value {
        match self.position(column) {
            Some(i) => &self.values[i],
            None => panic!("column '{column}' is not part of the result row"),
        }
    }
}

impl Serialize for ValueSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Forward-only sequence of rows produced by a select.
///
/// Consumed once; there is no way to rewind or re-run the query from here.
#[derive(Debug)]
pub struct ValueSets {
    rows: std::vec::IntoIter<ValueSet>,
}

impl ValueSets {
    pub fn new(rows: Vec<ValueSet>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Iterator for ValueSets {
    type Item = ValueSet;

    fn next(&mut self) -> Option<ValueSet> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for ValueSets {}

impl From<Vec<ValueSet>> for ValueSets {
    fn from(rows: Vec<ValueSet>) -> Self {
        Self::new(rows)
    }
}
