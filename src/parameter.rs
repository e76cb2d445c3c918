//! Named, typed parameter values bound to `@Name` placeholders.

use serde::Serialize;

use crate::value::{DataType, Value};

/// An immutable `(name, declared type, value)` triple.
///
/// The name is the literal following `@` in the SQL text, e.g. `Id` for
/// `@Id`. The declared type only steers how the provider coerces the value
/// when binding; nothing is validated locally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    name: String,
    data_type: DataType,
    value: Value,
}

impl Parameter {
    /// Create a parameter whose declared type is inferred from the value.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            data_type: value.data_type(),
            value,
        }
    }

    /// Create a parameter with an explicit declared type.
    pub fn typed(name: impl Into<String>, data_type: DataType, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            data_type,
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Ordered parameters passed with one statement. Empty means "no parameters".
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ParameterSet {
    parameters: Vec<Parameter>,
}

impl ParameterSet {
    /// Create an empty ParameterSet
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter with an inferred type
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.push(Parameter::new(name, value));
        self
    }

    /// Add a parameter with an explicit declared type
    pub fn with_typed(mut self, name: &str, data_type: DataType, value: impl Into<Value>) -> Self {
        self.parameters.push(Parameter::typed(name, data_type, value));
        self
    }

    pub fn add(&mut self, parameter: Parameter) {
        self.parameters.push(parameter);
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.parameters.iter()
    }
}

impl FromIterator<Parameter> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self {
            parameters: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.parameters.iter()
    }
}

impl IntoIterator for ParameterSet {
    type Item = Parameter;
    type IntoIter = std::vec::IntoIter<Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.parameters.into_iter()
    }
}
