//! Error types for batch evaluation

use std::io;
use thiserror::Error;

use crate::schema::ElementType;

/// Result type for batch evaluation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by user-supplied gather, scatter and model functions
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for batch evaluation operations
#[derive(Error, Debug)]
pub enum Error {
    /// A named column does not exist in the dataset
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A gather function failed
    #[error("Gather failed for input {input} {columns:?}: {source}")]
    Gather {
        /// Position of the input in declaration order
        input: usize,
        /// Source columns of the failing input
        columns: Vec<String>,
        /// Error raised by the gather function
        #[source]
        source: BoxError,
    },

    /// The model function failed
    #[error("Model invocation failed: {0}")]
    Model(#[source] BoxError),

    /// A scatter function failed, or produced a value the output buffer cannot hold
    #[error("Scatter failed for output '{column}' at row {row}: {source}")]
    Scatter {
        /// Destination column of the failing output
        column: String,
        /// Row position being populated
        row: usize,
        /// Error raised by the scatter function or the buffer
        #[source]
        source: BoxError,
    },

    /// A gathered tensor does not have one row per index
    #[error("Shape mismatch for input {input}: expected {expected} rows, got {actual}")]
    ShapeMismatch {
        /// Position of the input in declaration order
        input: usize,
        /// Row count of the index set
        expected: usize,
        /// Leading dimension of the gathered tensor
        actual: usize,
    },

    /// Data type mismatch
    #[error("Data type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Element type of the destination
        expected: ElementType,
        /// Description of the offending value
        actual: String,
    },

    /// The model result does not have the type a scatter function expects
    #[error("Unexpected model result type: expected {0}")]
    ModelResultType(&'static str),

    /// Index out of bounds
    #[error("Index out of bounds")]
    IndexOutOfBounds,

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error while reading configuration
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed configuration
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

static_assertions::assert_impl_all!(Error: Send, Sync, std::error::Error);
