//! Dataset layer interfaces consumed by the evaluation engine
//!
//! The engine never owns table storage. It borrows column sources and row
//! ranges from a [`Dataset`] for the duration of one evaluation.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::{IndexSet, RowIndex, RowRange, RowSet};
use crate::schema::ElementType;
use crate::value::Value;

/// Random-access, read-only accessor for one column
pub trait ColumnSource {
    /// Element type of the values in this column
    fn element_type(&self) -> ElementType;

    /// Read the value stored for a row
    fn read(&self, row: RowIndex) -> Result<Value>;

    /// Read a numeric value for a row, widened to `f64`
    fn read_f64(&self, row: RowIndex) -> Result<f64> {
        self.read(row)?.try_f64()
    }
}

/// A collection of named columns over a set of rows
pub trait Dataset {
    /// Resolve a column by name
    ///
    /// Fails with [`Error::UnknownColumn`](crate::Error::UnknownColumn) if the
    /// dataset has no such column.
    fn column_source(&self, name: &str) -> Result<&dyn ColumnSource>;

    /// All rows currently in the dataset
    fn current_rows(&self) -> &dyn RowRange;

    /// Rows added since the last change notification, if tracked
    fn added_rows(&self) -> Option<&dyn RowRange> {
        None
    }

    /// Rows modified since the last change notification, if tracked
    fn modified_rows(&self) -> Option<&dyn RowRange> {
        None
    }

    /// Get the number of rows in this dataset
    fn row_count(&self) -> usize {
        self.current_rows().size()
    }
}

static EMPTY_ROWS: RowSet = RowSet::empty();

/// Strategy choosing which rows of a dataset an evaluation covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowSelection {
    /// Every current row
    #[default]
    Current,

    /// Added rows followed by modified rows
    Changed,
}

impl RowSelection {
    /// Build the index set this strategy selects from `dataset`
    pub fn select<'a>(&self, dataset: &'a dyn Dataset) -> Result<IndexSet<'a>> {
        match self {
            RowSelection::Current => Ok(IndexSet::single(dataset.current_rows())),
            RowSelection::Changed => {
                let ranges: Vec<&'a dyn RowRange> = dataset
                    .added_rows()
                    .into_iter()
                    .chain(dataset.modified_rows())
                    .collect();

                if ranges.is_empty() {
                    Ok(IndexSet::single(&EMPTY_ROWS))
                } else {
                    IndexSet::new(ranges)
                }
            }
        }
    }
}
