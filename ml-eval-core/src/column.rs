//! Column implementation for storing typed vectors of data
//!
//! Columns serve both as the storage of the reference [`Table`](crate::table::Table)
//! and as the output buffers produced by the scatter phase of an evaluation.

use crate::dataset::ColumnSource;
use crate::error::{Error, Result};
use crate::index::RowIndex;
use crate::schema::ElementType;
use crate::value::Value;

/// Typed, dense, one-dimensional storage
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Boolean values
    Boolean(Vec<bool>),

    /// 32-bit signed integers
    Int32(Vec<i32>),

    /// 64-bit signed integers
    Int64(Vec<i64>),

    /// 32-bit floats
    Float32(Vec<f32>),

    /// 64-bit floats
    Float64(Vec<f64>),

    /// UTF-8 strings
    String(Vec<String>),

    /// Arbitrary values
    Object(Vec<Value>),
}

impl ColumnData {
    /// Allocate empty storage for `capacity` values of the given type
    pub fn with_capacity(element_type: ElementType, capacity: usize) -> Self {
        match element_type {
            ElementType::Boolean => ColumnData::Boolean(Vec::with_capacity(capacity)),
            ElementType::Int32 => ColumnData::Int32(Vec::with_capacity(capacity)),
            ElementType::Int64 => ColumnData::Int64(Vec::with_capacity(capacity)),
            ElementType::Float32 => ColumnData::Float32(Vec::with_capacity(capacity)),
            ElementType::Float64 => ColumnData::Float64(Vec::with_capacity(capacity)),
            ElementType::String => ColumnData::String(Vec::with_capacity(capacity)),
            ElementType::Object => ColumnData::Object(Vec::with_capacity(capacity)),
        }
    }

    /// Get the element type of this storage
    pub fn element_type(&self) -> ElementType {
        match self {
            ColumnData::Boolean(_) => ElementType::Boolean,
            ColumnData::Int32(_) => ElementType::Int32,
            ColumnData::Int64(_) => ElementType::Int64,
            ColumnData::Float32(_) => ElementType::Float32,
            ColumnData::Float64(_) => ElementType::Float64,
            ColumnData::String(_) => ElementType::String,
            ColumnData::Object(_) => ElementType::Object,
        }
    }

    /// Number of values stored
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float32(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::String(v) => v.len(),
            ColumnData::Object(v) => v.len(),
        }
    }

    /// Check if no values are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the value at `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        match self {
            ColumnData::Boolean(v) => v.get(index).copied().map(Value::Boolean),
            ColumnData::Int32(v) => v.get(index).copied().map(Value::Int32),
            ColumnData::Int64(v) => v.get(index).copied().map(Value::Int64),
            ColumnData::Float32(v) => v.get(index).copied().map(Value::Float32),
            ColumnData::Float64(v) => v.get(index).copied().map(Value::Float64),
            ColumnData::String(v) => v.get(index).cloned().map(Value::String),
            ColumnData::Object(v) => v.get(index).cloned(),
        }
    }

    /// Append a value
    ///
    /// The value must have exactly this storage's element type; no coercion is
    /// performed. `Object` storage accepts any value.
    pub fn push(&mut self, value: Value) -> Result<()> {
        match (self, value) {
            (ColumnData::Boolean(v), Value::Boolean(x)) => v.push(x),
            (ColumnData::Int32(v), Value::Int32(x)) => v.push(x),
            (ColumnData::Int64(v), Value::Int64(x)) => v.push(x),
            (ColumnData::Float32(v), Value::Float32(x)) => v.push(x),
            (ColumnData::Float64(v), Value::Float64(x)) => v.push(x),
            (ColumnData::String(v), Value::String(x)) => v.push(x),
            (ColumnData::Object(v), x) => v.push(x),
            (data, other) => {
                return Err(Error::TypeMismatch {
                    expected: data.element_type(),
                    actual: other.describe(),
                })
            }
        }
        Ok(())
    }

    /// Typed view of `Int32` storage
    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            ColumnData::Int32(v) => Some(v),
            _ => None,
        }
    }

    /// Typed view of `Int64` storage
    pub fn as_i64(&self) -> Option<&[i64]> {
        match self {
            ColumnData::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// Typed view of `Float64` storage
    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            ColumnData::Float64(v) => Some(v),
            _ => None,
        }
    }

}

macro_rules! impl_column_data_from_vec {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for ColumnData {
                fn from(values: Vec<$ty>) -> Self {
                    ColumnData::$variant(values)
                }
            }
        )*
    };
}

impl_column_data_from_vec!(
    bool => Boolean,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Value => Object,
);

/// A named column of data with a specific type
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Name of the column
    name: String,

    /// Values of the column
    data: ColumnData,
}

impl Column {
    /// Create a new column with the given name and data
    pub fn new(name: &str, data: impl Into<ColumnData>) -> Self {
        Self {
            name: name.to_string(),
            data: data.into(),
        }
    }

    /// Create a column of the given type from dynamically typed values
    pub fn from_values<I>(name: &str, element_type: ElementType, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let values = values.into_iter();
        let mut data = ColumnData::with_capacity(element_type, values.size_hint().0);
        for value in values {
            data.push(value)?;
        }
        Ok(Self::new(name, data))
    }

    /// Get the name of this column
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the element type of this column
    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    /// Get the length of this column (number of values)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if this column is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the value at a position
    pub fn value(&self, index: usize) -> Result<Value> {
        self.data.get(index).ok_or(Error::IndexOutOfBounds)
    }

    /// Get access to the typed storage
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    fn position(&self, row: RowIndex) -> Result<usize> {
        let position = usize::try_from(row.get()).map_err(|_| Error::IndexOutOfBounds)?;
        if position >= self.len() {
            return Err(Error::IndexOutOfBounds);
        }
        Ok(position)
    }
}

/// Row keys of a column are its positions
impl ColumnSource for Column {
    fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    fn read(&self, row: RowIndex) -> Result<Value> {
        let position = self.position(row)?;
        self.value(position)
    }

    #[allow(clippy::cast_precision_loss)]
    fn read_f64(&self, row: RowIndex) -> Result<f64> {
        let position = self.position(row)?;
        match &self.data {
            ColumnData::Float64(v) => Ok(v[position]),
            ColumnData::Int64(v) => Ok(v[position] as f64),
            ColumnData::Int32(v) => Ok(f64::from(v[position])),
            ColumnData::Float32(v) => Ok(f64::from(v[position])),
            other => other
                .get(position)
                .ok_or(Error::IndexOutOfBounds)?
                .try_f64(),
        }
    }
}
