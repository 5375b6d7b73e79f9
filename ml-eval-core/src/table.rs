//! In-memory reference dataset

use std::fmt;
use std::sync::Arc;

use crate::column::Column;
use crate::dataset::{ColumnSource, Dataset};
use crate::error::{Error, Result};
use crate::eval::OutputColumns;
use crate::index::{RowRange, RowSet};
use crate::schema::{ElementType, Field, Schema};
use crate::value::Value;

/// A collection of equal-length named columns over a flat row set
#[derive(Debug, Clone)]
pub struct Table {
    /// Schema describing the columns
    schema: Arc<Schema>,

    /// Columns in schema order
    columns: Vec<Column>,

    /// Current rows, keyed by position
    rows: RowSet,

    /// Rows marked as added
    added: Option<RowSet>,

    /// Rows marked as modified
    modified: Option<RowSet>,
}

impl Table {
    /// Create a table from columns
    ///
    /// Fails if two columns share a name or the columns differ in length.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map_or(0, Column::len);
        if columns.iter().any(|c| c.len() != row_count) {
            return Err(Error::InvalidArgument(
                "All columns must have the same length".into(),
            ));
        }

        Ok(Self {
            schema: Arc::new(schema_of(&columns)?),
            columns,
            rows: RowSet::flat(row_count),
            added: None,
            modified: None,
        })
    }

    /// Create a table with `row_count` rows and no columns
    pub fn empty(row_count: usize) -> Self {
        Self {
            schema: Arc::new(Schema::default()),
            columns: Vec::new(),
            rows: RowSet::flat(row_count),
            added: None,
            modified: None,
        }
    }

    /// Get the schema of this table
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Get the number of columns in this table
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if this table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get a column by name
    pub fn column(&self, name: &str) -> Result<&Column> {
        let index = self.schema.index_of(name)?;
        Ok(&self.columns[index])
    }

    /// Get all columns
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Derive a column from its row position, replacing any column of the same name
    pub fn update<F>(&mut self, name: &str, element_type: ElementType, f: F) -> Result<()>
    where
        F: FnMut(usize) -> Value,
    {
        let column = Column::from_values(name, element_type, (0..self.row_count()).map(f))?;

        match self.schema.index_of(name) {
            Ok(index) => self.columns[index] = column,
            Err(_) => self.columns.push(column),
        }
        self.schema = Arc::new(schema_of(&self.columns)?);
        Ok(())
    }

    /// Add a column
    ///
    /// Fails if the name is taken or the length differs from the row count.
    pub fn with_column(mut self, column: Column) -> Result<Self> {
        if self.schema.contains(column.name()) {
            return Err(Error::InvalidArgument(format!(
                "Column already exists: {}",
                column.name()
            )));
        }
        if column.len() != self.row_count() {
            return Err(Error::InvalidArgument(format!(
                "Column '{}' has {} rows, table has {}",
                column.name(),
                column.len(),
                self.row_count()
            )));
        }

        self.columns.push(column);
        self.schema = Arc::new(schema_of(&self.columns)?);
        Ok(self)
    }

    /// Merge the columns produced by an evaluation
    pub fn with_outputs(self, outputs: OutputColumns) -> Result<Self> {
        outputs
            .into_iter()
            .try_fold(self, |table, column| table.with_column(column))
    }

    /// Remove columns by name
    pub fn drop_columns(mut self, names: &[&str]) -> Result<Self> {
        for name in names {
            self.schema.index_of(name)?;
        }

        self.columns.retain(|c| !names.contains(&c.name()));
        self.schema = Arc::new(schema_of(&self.columns)?);
        Ok(self)
    }

    /// Mark rows as added and modified since the last notification
    ///
    /// Keys must be positions of current rows.
    pub fn with_changes(mut self, added: RowSet, modified: RowSet) -> Result<Self> {
        let row_count = self.row_count() as u64;
        for set in [&added, &modified] {
            if set.max_key().is_some_and(|key| key >= row_count) {
                return Err(Error::IndexOutOfBounds);
            }
        }

        self.added = Some(added);
        self.modified = Some(modified);
        Ok(self)
    }

    /// Forget any rows marked as added or modified
    pub fn clear_changes(&mut self) {
        self.added = None;
        self.modified = None;
    }

}

fn schema_of(columns: &[Column]) -> Result<Schema> {
    Schema::new(
        columns
            .iter()
            .map(|c| Field::new(c.name(), c.element_type()))
            .collect(),
    )
}

impl Dataset for Table {
    fn column_source(&self, name: &str) -> Result<&dyn ColumnSource> {
        self.column(name).map(|c| c as &dyn ColumnSource)
    }

    fn current_rows(&self) -> &dyn RowRange {
        &self.rows
    }

    fn added_rows(&self) -> Option<&dyn RowRange> {
        self.added.as_ref().map(|r| r as &dyn RowRange)
    }

    fn modified_rows(&self) -> Option<&dyn RowRange> {
        self.modified.as_ref().map(|r| r as &dyn RowRange)
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_ROWS: usize = 20;
        const WIDTH: usize = 15;

        writeln!(
            f,
            "Table: {} rows, {} columns",
            self.row_count(),
            self.columns.len()
        )?;

        let header: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{:WIDTH$}", format!("{} ({})", c.name(), c.element_type())))
            .collect();
        writeln!(f, "{}", header.join(" | "))?;

        let separator: Vec<String> = self.columns.iter().map(|_| "-".repeat(WIDTH)).collect();
        writeln!(f, "{}", separator.join("-+-"))?;

        let display_rows = self.row_count().min(MAX_ROWS);
        for row in 0..display_rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|c| match c.value(row) {
                    Ok(value) => format!("{:WIDTH$}", value.to_string()),
                    Err(_) => format!("{:WIDTH$}", "?"),
                })
                .collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }

        if display_rows < self.row_count() {
            writeln!(f, "... ({} more rows)", self.row_count() - display_rows)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::RowSelection;

    fn numbers() -> Table {
        Table::new(vec![
            Column::new("x", vec![1i64, 2, 3]),
            Column::new("y", vec![0.5f64, 1.5, 2.5]),
        ])
        .unwrap()
    }

    #[test]
    fn new_validates_columns() {
        let uneven = Table::new(vec![
            Column::new("x", vec![1i64, 2]),
            Column::new("y", vec![1i64]),
        ]);
        assert!(matches!(uneven, Err(Error::InvalidArgument(_))));

        let duplicate = Table::new(vec![
            Column::new("x", vec![1i64]),
            Column::new("x", vec![2i64]),
        ]);
        assert!(matches!(duplicate, Err(Error::InvalidArgument(_))));

        assert_eq!(numbers().row_count(), 3);
        assert_eq!(numbers().column_count(), 2);
    }

    #[test]
    fn update_derives_and_replaces_columns() {
        let mut table = Table::empty(4);
        table
            .update("x", ElementType::Int64, |i| Value::Int64(i64::try_from(i).unwrap()))
            .unwrap();
        assert_eq!(table.column("x").unwrap().data().as_i64(), Some(&[0, 1, 2, 3][..]));

        table
            .update("x", ElementType::String, |i| Value::from(format!("row{i}")))
            .unwrap();
        assert_eq!(table.column_count(), 1);
        assert_eq!(table.column("x").unwrap().value(2).unwrap(), Value::from("row2"));

        let err = table.update("bad", ElementType::Int32, |_| Value::Float64(1.0));
        assert!(matches!(err, Err(Error::TypeMismatch { .. })));
        assert!(!table.schema().contains("bad"));
    }

    #[test]
    fn with_column_rejects_collisions_and_length_mismatch() {
        let table = numbers();
        assert!(table
            .clone()
            .with_column(Column::new("x", vec![0i64, 0, 0]))
            .is_err());
        assert!(table
            .clone()
            .with_column(Column::new("z", vec![0i64]))
            .is_err());

        let table = table.with_column(Column::new("z", vec![true, false, true])).unwrap();
        assert_eq!(table.schema().index_of("z").unwrap(), 2);
    }

    #[test]
    fn drop_columns_requires_known_names() {
        let table = numbers();
        assert!(matches!(
            table.clone().drop_columns(&["nope"]),
            Err(Error::UnknownColumn(_))
        ));

        let table = table.drop_columns(&["x"]).unwrap();
        assert_eq!(table.column_count(), 1);
        assert_eq!(table.row_count(), 3);
        assert!(table.column("x").is_err());
    }

    #[test]
    fn changes_feed_the_changed_selection() {
        let table = numbers();
        assert!(matches!(
            table.clone().with_changes(RowSet::from_keys([3]).unwrap(), RowSet::empty()),
            Err(Error::IndexOutOfBounds)
        ));

        let mut table = table
            .with_changes(RowSet::from_keys([2]).unwrap(), RowSet::flat(1))
            .unwrap();
        let index = RowSelection::Changed.select(&table).unwrap();
        let keys: Vec<u64> = index.iter().map(|r| r.get()).collect();
        assert_eq!(keys, vec![2, 0]);

        table.clear_changes();
        assert!(RowSelection::Changed.select(&table).unwrap().is_empty());
    }

    #[test]
    fn column_sources_read_by_position() {
        let table = numbers();
        let source = table.column_source("y").unwrap();
        assert_eq!(source.element_type(), ElementType::Float64);
        assert!((source.read_f64(2.into()).unwrap() - 2.5).abs() < f64::EPSILON);
        assert!(matches!(source.read(3.into()), Err(Error::IndexOutOfBounds)));
        assert!(matches!(
            table.column_source("missing"),
            Err(Error::UnknownColumn(name)) if name == "missing"
        ));
    }

    #[test]
    fn display_lists_columns_and_rows() {
        let text = numbers().to_string();
        assert!(text.starts_with("Table: 3 rows, 2 columns"));
        assert!(text.contains("x (int64)"));
        assert!(text.contains("2.5"));
    }
}
