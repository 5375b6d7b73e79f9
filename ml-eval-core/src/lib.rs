//! Gather/scatter batch evaluation of row-oriented datasets
//!
//! This crate evaluates a vectorized model over a selection of dataset rows.
//! Each declared [`Input`] gathers its source columns into a dense
//! [`BatchTensor`], the [`Model`] runs once over all batches, and each declared
//! [`Output`] scatters the model result back into a new per-row column. Row
//! alignment is preserved by driving every gather from the same [`IndexSet`].

#![warn(missing_docs)]

pub mod column;
pub mod dataset;
pub mod descriptor;
pub mod error;
pub mod eval;
pub mod index;
pub mod schema;
pub mod table;
pub mod tensor;
pub mod value;

// Re-export key types for convenience
pub use column::{Column, ColumnData};
pub use dataset::{ColumnSource, Dataset, RowSelection};
pub use descriptor::{model_fn, BatchTensor, Gather, Input, Model, ModelResult, Output, Scatter};
pub use error::{BoxError, Error, Result};
pub use eval::{evaluate, EvalConfig, EvalStats, Evaluator, OutputColumns};
pub use index::{IndexSet, RowIndex, RowRange, RowSet, Rows};
pub use schema::{ElementType, Field, Schema};
pub use table::Table;
pub use tensor::{DenseTensor, TensorType};
pub use value::Value;
