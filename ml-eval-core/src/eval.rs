//! Gather/scatter evaluation engine
//!
//! An evaluation runs in four phases over one shared [`IndexSet`]:
//!
//! 1. every [`Input`] has its source columns resolved against the dataset,
//! 2. each input's gather function receives a fresh pass over the rows and
//!    builds one [`BatchTensor`],
//! 3. the model is invoked exactly once with all batches, in input order,
//! 4. each [`Output`]'s scatter function is called once per row position and
//!    its values are stored in a newly allocated column.
//!
//! Row position `i` in every output column refers to the `i`-th row of the
//! index set enumeration used during gather. Nothing is merged back into the
//! dataset; the caller owns the returned columns.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::column::{Column, ColumnData};
use crate::dataset::{ColumnSource, Dataset, RowSelection};
use crate::descriptor::{BatchTensor, Input, Model, Output};
use crate::error::{Error, Result};
use crate::index::IndexSet;

/// Configuration for an evaluator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Which rows of the dataset an evaluation covers
    pub rows: RowSelection,

    /// Reject gathered tensors whose leading dimension differs from the row count
    pub check_row_counts: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            rows: RowSelection::Current,
            check_row_counts: true,
        }
    }
}

impl EvalConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

/// Statistics from one evaluation
#[derive(Debug, Clone, Serialize)]
pub struct EvalStats {
    /// Identifier attached to the evaluation's tracing span
    pub evaluation_id: Uuid,

    /// Number of rows evaluated
    pub rows: usize,

    /// Number of inputs gathered
    pub inputs: usize,

    /// Number of outputs scattered
    pub outputs: usize,

    /// Time spent in gather functions
    pub gather_time: Duration,

    /// Time spent in the model
    pub model_time: Duration,

    /// Time spent in scatter functions
    pub scatter_time: Duration,

    /// Total execution time
    pub execution_time: Duration,
}

/// Output columns of one evaluation, in output declaration order
#[derive(Debug, Clone)]
pub struct OutputColumns {
    columns: Vec<Column>,
    stats: EvalStats,
}

impl OutputColumns {
    /// Get an output column by name
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// All output columns
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Names of the output columns
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(Column::name)
    }

    /// Number of output columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the evaluation declared no outputs
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Statistics of the evaluation that produced these columns
    pub fn stats(&self) -> &EvalStats {
        &self.stats
    }

    /// Take ownership of the columns keyed by name
    pub fn into_map(self) -> HashMap<String, Column> {
        self.columns
            .into_iter()
            .map(|c| (c.name().to_string(), c))
            .collect()
    }
}

impl IntoIterator for OutputColumns {
    type Item = Column;
    type IntoIter = std::vec::IntoIter<Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

/// Runs gather/scatter evaluations
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvalConfig,
}

impl Evaluator {
    /// Create an evaluator with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an evaluator with the given configuration
    pub fn with_config(config: EvalConfig) -> Self {
        Self { config }
    }

    /// Get the configuration of this evaluator
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate over the rows chosen by the configured [`RowSelection`]
    pub fn evaluate<M>(
        &self,
        dataset: &dyn Dataset,
        model: &mut M,
        inputs: &[Input],
        outputs: &[Output],
    ) -> Result<OutputColumns>
    where
        M: Model + ?Sized,
    {
        tracing::info!(selection = ?self.config.rows, "setting up evaluation");
        let column_sets = resolve(dataset, inputs, outputs)?;
        let index = self.config.rows.select(dataset)?;
        self.run(&index, &column_sets, model, inputs, outputs)
    }

    /// Evaluate over a caller-supplied index set
    pub fn evaluate_rows<M>(
        &self,
        dataset: &dyn Dataset,
        index: &IndexSet<'_>,
        model: &mut M,
        inputs: &[Input],
        outputs: &[Output],
    ) -> Result<OutputColumns>
    where
        M: Model + ?Sized,
    {
        tracing::info!(ranges = index.range_count(), "setting up evaluation");
        let column_sets = resolve(dataset, inputs, outputs)?;
        self.run(index, &column_sets, model, inputs, outputs)
    }

    fn run<M>(
        &self,
        index: &IndexSet<'_>,
        column_sets: &[Vec<&dyn ColumnSource>],
        model: &mut M,
        inputs: &[Input],
        outputs: &[Output],
    ) -> Result<OutputColumns>
    where
        M: Model + ?Sized,
    {
        let evaluation_id = Uuid::new_v4();
        let rows = index.len();
        let span = tracing::info_span!(
            "evaluate",
            id = %evaluation_id,
            rows,
            inputs = inputs.len(),
            outputs = outputs.len()
        );
        let _entered = span.enter();
        let start = Instant::now();

        tracing::info!("gathering inputs");
        let gather_start = Instant::now();
        let batches = self.gather(index, column_sets, inputs)?;
        let gather_time = gather_start.elapsed();

        tracing::info!("computing model");
        let model_start = Instant::now();
        let result = model.invoke(batches).map_err(Error::Model)?;
        let model_time = model_start.elapsed();

        tracing::info!("populating outputs");
        let scatter_start = Instant::now();
        let mut columns = Vec::with_capacity(outputs.len());
        for output in outputs {
            tracing::debug!(
                column = output.column(),
                element_type = %output.element_type(),
                "generating output"
            );

            let mut data = ColumnData::with_capacity(output.element_type(), rows);
            for row in 0..rows {
                let value = output
                    .scatter()
                    .scatter(&result, row)
                    .map_err(|source| Error::Scatter {
                        column: output.column().to_string(),
                        row,
                        source,
                    })?;
                data.push(value).map_err(|err| Error::Scatter {
                    column: output.column().to_string(),
                    row,
                    source: Box::new(err),
                })?;
            }
            columns.push(Column::new(output.column(), data));
        }
        let scatter_time = scatter_start.elapsed();

        let stats = EvalStats {
            evaluation_id,
            rows,
            inputs: inputs.len(),
            outputs: outputs.len(),
            gather_time,
            model_time,
            scatter_time,
            execution_time: start.elapsed(),
        };
        tracing::info!(elapsed = ?stats.execution_time, "evaluation complete");

        Ok(OutputColumns { columns, stats })
    }

    fn gather(
        &self,
        index: &IndexSet<'_>,
        column_sets: &[Vec<&dyn ColumnSource>],
        inputs: &[Input],
    ) -> Result<Vec<BatchTensor>> {
        let expected = index.len();
        let mut batches = Vec::with_capacity(inputs.len());

        for (position, (input, sources)) in inputs.iter().zip(column_sets).enumerate() {
            let tensor = input
                .gather()
                .gather(index.iter(), sources)
                .map_err(|source| Error::Gather {
                    input: position,
                    columns: input.columns().to_vec(),
                    source,
                })?;

            if self.config.check_row_counts {
                match tensor.rows() {
                    Some(actual) if actual == expected => {}
                    Some(actual) => {
                        return Err(Error::ShapeMismatch {
                            input: position,
                            expected,
                            actual,
                        })
                    }
                    None => {
                        return Err(Error::InvalidArgument(format!(
                            "Input {position} gathered a rank-0 tensor, expected {expected} rows"
                        )))
                    }
                }
            }

            tracing::debug!(
                input = position,
                columns = ?input.columns(),
                shape = ?tensor.shape(),
                "gathered input"
            );
            batches.push(tensor);
        }

        Ok(batches)
    }
}

/// Resolve every input's source columns, preserving per-input order
fn resolve<'d>(
    dataset: &'d dyn Dataset,
    inputs: &[Input],
    outputs: &[Output],
) -> Result<Vec<Vec<&'d dyn ColumnSource>>> {
    let mut seen = HashSet::with_capacity(outputs.len());
    for output in outputs {
        if !seen.insert(output.column()) {
            return Err(Error::InvalidArgument(format!(
                "Output column declared twice: {}",
                output.column()
            )));
        }
    }

    inputs
        .iter()
        .enumerate()
        .map(|(position, input)| {
            if input.columns().is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "Input {position} names no source columns"
                )));
            }
            input
                .columns()
                .iter()
                .map(|name| dataset.column_source(name))
                .collect::<Result<Vec<_>>>()
        })
        .collect()
}

/// Evaluate `model` over every current row of `dataset` with the default configuration
pub fn evaluate<M>(
    dataset: &dyn Dataset,
    model: &mut M,
    inputs: &[Input],
    outputs: &[Output],
) -> Result<OutputColumns>
where
    M: Model + ?Sized,
{
    Evaluator::new().evaluate(dataset, model, inputs, outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{model_fn, MockModel, ModelResult};
    use crate::error::BoxError;
    use crate::index::{RowRange, Rows, RowSet};
    use crate::schema::ElementType;
    use crate::table::Table;
    use crate::value::Value;

    fn gather_column(rows: Rows<'_>, cols: &[&dyn ColumnSource]) -> std::result::Result<BatchTensor, BoxError> {
        let mut tensor = BatchTensor::zeros(vec![rows.len(), cols.len()]);
        for (i, row) in rows.enumerate() {
            for (j, col) in cols.iter().enumerate() {
                tensor.set(&[i, j], col.read_f64(row)?)?;
            }
        }
        Ok(tensor)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn scatter_first(result: &ModelResult, row: usize) -> std::result::Result<Value, BoxError> {
        let tensor = result.get::<BatchTensor>()?;
        Ok(Value::Int64(tensor.get(&[row, 0])? as i64))
    }

    fn ids(n: i64) -> Table {
        Table::new(vec![Column::new("id", (0..n).collect::<Vec<i64>>())]).unwrap()
    }

    #[test]
    fn model_is_invoked_exactly_once() {
        let table = ids(4);
        let mut model = MockModel::new();
        model
            .expect_invoke()
            .times(1)
            .returning(|mut inputs| Ok(ModelResult::new(inputs.remove(0))));

        let inputs = [
            Input::single("id", gather_column),
            Input::single("id", gather_column),
        ];
        let outputs = [
            Output::new("a", scatter_first).with_type(ElementType::Int64),
            Output::new("b", scatter_first).with_type(ElementType::Int64),
            Output::new("c", scatter_first),
        ];

        let result = evaluate(&table, &mut model, &inputs, &outputs).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.stats().rows, 4);
        assert_eq!(result.stats().inputs, 2);
    }

    #[test]
    fn model_receives_inputs_in_declaration_order() {
        let table = Table::new(vec![
            Column::new("x", vec![1.0f64, 2.0]),
            Column::new("y", vec![10.0f64, 20.0]),
        ])
        .unwrap();

        let mut model = MockModel::new();
        model
            .expect_invoke()
            .withf(|inputs| {
                inputs.len() == 2
                    && inputs[0].as_slice() == [10.0, 20.0]
                    && inputs[1].as_slice() == [1.0, 10.0, 2.0, 20.0]
            })
            .times(1)
            .returning(|_| Ok(ModelResult::new(())));

        let inputs = [
            Input::single("y", gather_column),
            Input::new(["x", "y"], gather_column),
        ];
        evaluate(&table, &mut model, &inputs, &[]).unwrap();
    }

    #[test]
    fn model_failure_aborts_before_scatter() {
        let table = ids(2);
        let mut model = model_fn(|_| Err("model exploded".into()));
        let outputs = [Output::new("a", |_: &ModelResult, _| -> std::result::Result<Value, BoxError> {
            panic!("scatter must not run")
        })];

        let err = evaluate(&table, &mut model, &[Input::single("id", gather_column)], &outputs)
            .unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }

    #[test]
    fn doubling_model_scatters_integers() {
        let table = ids(3);
        let mut model = model_fn(|inputs| Ok(ModelResult::new(inputs[0].map(|v| v * 2.0))));
        #[allow(clippy::cast_possible_truncation)]
        let to_int = |result: &ModelResult, row: usize| -> std::result::Result<Value, BoxError> {
            let tensor = result.get::<BatchTensor>()?;
            Ok(Value::Int32(tensor.get(&[row, 0])? as i32))
        };

        let result = evaluate(
            &table,
            &mut model,
            &[Input::single("id", gather_column)],
            &[Output::new("doubled", to_int).with_type(ElementType::Int32)],
        )
        .unwrap();

        let doubled = result.into_map().remove("doubled").unwrap();
        assert_eq!(doubled.data().as_i32(), Some(&[0, 2, 4][..]));
    }

    #[test]
    fn failing_second_gather_skips_model() {
        fn refuse(_: Rows<'_>, _: &[&dyn ColumnSource]) -> std::result::Result<BatchTensor, BoxError> {
            Err("no batch".into())
        }

        let table = ids(3);
        let mut model = MockModel::new();
        model.expect_invoke().never();
        let inputs = [Input::single("id", gather_column), Input::single("id", refuse)];

        let err = evaluate(&table, &mut model, &inputs, &[]).unwrap_err();
        assert!(matches!(err, Error::Gather { input: 1, .. }));
        assert!(err.to_string().contains("no batch"));
    }

    #[test]
    fn shape_check_can_be_disabled() {
        let table = ids(3);
        fn short(_: Rows<'_>, _: &[&dyn ColumnSource]) -> std::result::Result<BatchTensor, BoxError> {
            Ok(BatchTensor::zeros(vec![1, 1]))
        }
        let mut model = model_fn(|inputs| Ok(ModelResult::new(inputs.len())));

        let err = evaluate(&table, &mut model, &[Input::single("id", short)], &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::ShapeMismatch { input: 0, expected: 3, actual: 1 }
        ));

        let lenient = Evaluator::with_config(EvalConfig {
            check_row_counts: false,
            ..EvalConfig::default()
        });
        let result = lenient
            .evaluate(&table, &mut model, &[Input::single("id", short)], &[])
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn rank_zero_gather_is_rejected_with_its_own_error() {
        fn scalar(_: Rows<'_>, _: &[&dyn ColumnSource]) -> std::result::Result<BatchTensor, BoxError> {
            Ok(BatchTensor::zeros(Vec::new()))
        }

        let table = ids(0);
        let mut model = MockModel::new();
        model.expect_invoke().never();

        let err = evaluate(&table, &mut model, &[Input::single("id", scalar)], &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref msg) if msg.contains("rank-0")));
    }

    #[test]
    fn duplicate_output_names_are_rejected() {
        let table = ids(1);
        let mut model = MockModel::new();
        model.expect_invoke().never();
        let outputs = [Output::new("a", scatter_first), Output::new("a", scatter_first)];

        let err = evaluate(&table, &mut model, &[], &outputs).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn input_without_columns_is_rejected() {
        let table = ids(1);
        let mut model = MockModel::new();
        model.expect_invoke().never();
        let inputs = [Input::new(Vec::<String>::new(), gather_column)];

        let err = evaluate(&table, &mut model, &inputs, &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn caller_supplied_index_set_drives_every_pass() {
        let table = ids(10);
        let tail = RowSet::from_range(7..10).unwrap();
        let head = RowSet::from_keys([2, 0]).unwrap();
        let index = IndexSet::new(vec![&tail as &dyn RowRange, &head]).unwrap();

        let mut model = model_fn(|mut inputs| Ok(ModelResult::new(inputs.remove(0))));
        let result = Evaluator::new()
            .evaluate_rows(
                &table,
                &index,
                &mut model,
                &[Input::single("id", gather_column)],
                &[Output::new("echo", scatter_first).with_type(ElementType::Int64)],
            )
            .unwrap();

        let echo = result.get("echo").unwrap();
        assert_eq!(echo.data().as_i64(), Some(&[7, 8, 9, 2, 0][..]));
    }
}
