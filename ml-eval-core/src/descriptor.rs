//! Input and output descriptors, and the function capabilities they carry

use std::any::{type_name, Any};
use std::fmt;

use crate::dataset::ColumnSource;
use crate::error::{BoxError, Error};
use crate::index::Rows;
use crate::schema::ElementType;
use crate::tensor::DenseTensor;
use crate::value::Value;

/// Dense batch assembled by a gather function, one row per index
pub type BatchTensor = DenseTensor<f64>;

/// Builds one batch tensor from a pass over the rows and the resolved columns
///
/// Columns are passed in the order the [`Input`] names them.
pub trait Gather {
    /// Gather the batch tensor
    fn gather(
        &self,
        rows: Rows<'_>,
        columns: &[&dyn ColumnSource],
    ) -> Result<BatchTensor, BoxError>;
}

impl<F> Gather for F
where
    F: Fn(Rows<'_>, &[&dyn ColumnSource]) -> Result<BatchTensor, BoxError>,
{
    fn gather(
        &self,
        rows: Rows<'_>,
        columns: &[&dyn ColumnSource],
    ) -> Result<BatchTensor, BoxError> {
        self(rows, columns)
    }
}

/// Extracts the value for one row position from a model result
pub trait Scatter {
    /// Produce the output value for row position `row`
    fn scatter(&self, result: &ModelResult, row: usize) -> Result<Value, BoxError>;
}

impl<F> Scatter for F
where
    F: Fn(&ModelResult, usize) -> Result<Value, BoxError>,
{
    fn scatter(&self, result: &ModelResult, row: usize) -> Result<Value, BoxError> {
        self(result, row)
    }
}

/// A vectorized model called once per evaluation
///
/// Receives one batch tensor per input, in input declaration order.
#[cfg_attr(test, mockall::automock)]
pub trait Model {
    /// Run the model over the gathered batches
    fn invoke(&mut self, inputs: Vec<BatchTensor>) -> Result<ModelResult, BoxError>;
}

impl<F> Model for F
where
    F: FnMut(Vec<BatchTensor>) -> Result<ModelResult, BoxError>,
{
    fn invoke(&mut self, inputs: Vec<BatchTensor>) -> Result<ModelResult, BoxError> {
        self(inputs)
    }
}

/// Pin a closure to the [`Model`] signature so its argument and error types infer
pub fn model_fn<F>(f: F) -> F
where
    F: FnMut(Vec<BatchTensor>) -> Result<ModelResult, BoxError>,
{
    f
}

/// Opaque result of a model invocation
///
/// Its structure is private between a model and the scatter functions written
/// for it.
pub struct ModelResult(Box<dyn Any + Send>);

impl ModelResult {
    /// Wrap a model-defined value
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Borrow the wrapped value as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Borrow the wrapped value as `T`, failing with a typed error otherwise
    pub fn get<T: Any>(&self) -> Result<&T, Error> {
        self.downcast_ref::<T>()
            .ok_or(Error::ModelResultType(type_name::<T>()))
    }

    /// Check whether the wrapped value is a `T`
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl fmt::Debug for ModelResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModelResult(..)")
    }
}

/// A declared model input: source columns plus the gather function that batches them
pub struct Input {
    /// Source column names, in the order the gather function expects
    columns: Vec<String>,

    /// Gather function
    gather: Box<dyn Gather>,
}

impl Input {
    /// Create an input over one or more source columns
    pub fn new<I, S, F>(columns: I, gather: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Rows<'_>, &[&dyn ColumnSource]) -> Result<BatchTensor, BoxError> + 'static,
    {
        Self::with_gather(columns, gather)
    }

    /// Create an input over a single source column
    pub fn single<F>(column: &str, gather: F) -> Self
    where
        F: Fn(Rows<'_>, &[&dyn ColumnSource]) -> Result<BatchTensor, BoxError> + 'static,
    {
        Self::with_gather([column], gather)
    }

    /// Create an input backed by any [`Gather`] implementation
    pub fn with_gather<I, S, G>(columns: I, gather: G) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        G: Gather + 'static,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            gather: Box::new(gather),
        }
    }

    /// Source column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Gather function
    pub fn gather(&self) -> &dyn Gather {
        self.gather.as_ref()
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// A declared output: destination column, scatter function and element type
pub struct Output {
    /// Destination column name
    column: String,

    /// Scatter function
    scatter: Box<dyn Scatter>,

    /// Element type of the destination buffer
    element_type: ElementType,
}

impl Output {
    /// Create an output with the `Object` element type
    pub fn new<F>(column: &str, scatter: F) -> Self
    where
        F: Fn(&ModelResult, usize) -> Result<Value, BoxError> + 'static,
    {
        Self::with_scatter(column, scatter)
    }

    /// Create an output backed by any [`Scatter`] implementation
    pub fn with_scatter<S: Scatter + 'static>(column: &str, scatter: S) -> Self {
        Self {
            column: column.to_string(),
            scatter: Box::new(scatter),
            element_type: ElementType::Object,
        }
    }

    /// Set the element type of the destination buffer
    #[must_use]
    pub fn with_type(mut self, element_type: ElementType) -> Self {
        self.element_type = element_type;
        self
    }

    /// Destination column name
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Element type of the destination buffer
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Scatter function
    pub fn scatter(&self) -> &dyn Scatter {
        self.scatter.as_ref()
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("column", &self.column)
            .field("element_type", &self.element_type)
            .finish_non_exhaustive()
    }
}
