//! Demonstration workload and benchmarks for batch evaluation
//!
//! The workload builds a table with an integer column `X`, its square root `Y`
//! and an opaque payload column `Z`, then evaluates a three-output model over
//! it. The same workload backs the throughput benchmarks.

use std::time::{Duration, Instant};

use serde::Serialize;

use ml_eval_core::error::{BoxError, Error, Result};
use ml_eval_core::{
    evaluate, BatchTensor, ColumnSource, ElementType, EvalStats, Input, ModelResult, Output,
    Rows, Table, Value,
};

/// Width of a nugget payload
pub const NUGGET_WIDTH: usize = 5;

/// Opaque per-row object carried in the `Z` column
#[derive(Debug, Clone, PartialEq)]
pub struct Nugget {
    payload: [f64; NUGGET_WIDTH],
}

impl Nugget {
    /// Build the payload for row value `x`
    ///
    /// Each element is `x` plus an offset in `4..12` that depends only on `x`
    /// and the element position.
    #[allow(clippy::cast_precision_loss)]
    pub fn for_value(x: i64) -> Self {
        let mut payload = [0.0; NUGGET_WIDTH];
        for (k, slot) in payload.iter_mut().enumerate() {
            let offset = (x.unsigned_abs() * 7 + k as u64 * 3) % 8 + 4;
            *slot = (x + offset as i64) as f64;
        }
        Self { payload }
    }

    /// Payload values
    pub fn payload(&self) -> &[f64] {
        &self.payload
    }
}

/// Build the demonstration table with `rows` rows
pub fn demo_table(rows: usize) -> Result<Table> {
    let mut table = Table::empty(rows);
    table.update("X", ElementType::Int64, |i| {
        Value::Int64(i64::try_from(i).unwrap_or(i64::MAX))
    })?;

    let x = table.column("X")?.data().as_i64().unwrap_or_default().to_vec();
    #[allow(clippy::cast_precision_loss)]
    table.update("Y", ElementType::Float64, |i| Value::Float64((x[i] as f64).sqrt()))?;
    table.update("Z", ElementType::Object, |i| Value::opaque(Nugget::for_value(x[i])))?;

    Ok(table)
}

/// Gather one tensor column per source column, widening to `f64`
pub fn gather_2d(rows: Rows<'_>, columns: &[&dyn ColumnSource]) -> std::result::Result<BatchTensor, BoxError> {
    let shape = vec![rows.len(), columns.len()];
    let mut data = Vec::with_capacity(rows.len() * columns.len());
    for row in rows {
        for column in columns {
            data.push(column.read_f64(row)?);
        }
    }
    Ok(BatchTensor::from_vec(data, shape)?)
}

/// Gather the payload of a single nugget column
pub fn gather_nugget(rows: Rows<'_>, columns: &[&dyn ColumnSource]) -> std::result::Result<BatchTensor, BoxError> {
    let [column] = columns else {
        return Err(format!("Expected 1 column, got {}", columns.len()).into());
    };

    let mut tensor = BatchTensor::zeros(vec![rows.len(), NUGGET_WIDTH]);
    for (i, row) in rows.enumerate() {
        let value = column.read(row)?;
        let nugget = value.downcast_ref::<Nugget>().ok_or_else(|| Error::TypeMismatch {
            expected: ElementType::Object,
            actual: value.describe(),
        })?;
        tensor.row_mut(i)?.copy_from_slice(nugget.payload());
    }
    Ok(tensor)
}

/// Result of [`demo_model`]
pub type DemoResult = (BatchTensor, BatchTensor, BatchTensor);

/// Compute `(3a, b + 11, b + 32)` from the gathered `(a, b, c)`
pub fn demo_model(inputs: Vec<BatchTensor>) -> std::result::Result<ModelResult, BoxError> {
    let [a, b, _c]: [BatchTensor; 3] = inputs
        .try_into()
        .map_err(|inputs: Vec<BatchTensor>| format!("Expected 3 inputs, got {}", inputs.len()))?;

    let result: DemoResult = (a.map(|v| 3.0 * v), b.map(|v| v + 11.0), b.map(|v| v + 32.0));
    Ok(ModelResult::new(result))
}

/// `A`: integer part of the first model output
#[allow(clippy::cast_possible_truncation)]
pub fn scatter_a(result: &ModelResult, row: usize) -> std::result::Result<Value, BoxError> {
    let (data0, _, _) = result.get::<DemoResult>()?;
    Ok(Value::Int32(data0.get(&[row, 0])? as i32))
}

/// `B`: second feature of the second model output
pub fn scatter_b(result: &ModelResult, row: usize) -> std::result::Result<Value, BoxError> {
    let (_, data1, _) = result.get::<DemoResult>()?;
    Ok(Value::Float64(data1.get(&[row, 1])?))
}

/// `C`: square root of the second features of the last two outputs combined
pub fn scatter_c(result: &ModelResult, row: usize) -> std::result::Result<Value, BoxError> {
    let (_, data1, data2) = result.get::<DemoResult>()?;
    Ok(Value::Float64((data2.get(&[row, 1])? + data1.get(&[row, 1])?).sqrt()))
}

/// Inputs of the demonstration evaluation
pub fn demo_inputs() -> Vec<Input> {
    vec![
        Input::single("X", gather_2d),
        Input::new(["X", "Y"], gather_2d),
        Input::single("Z", gather_nugget),
    ]
}

/// Outputs of the demonstration evaluation
pub fn demo_outputs() -> Vec<Output> {
    vec![
        Output::new("A", scatter_a).with_type(ElementType::Int32),
        Output::new("B", scatter_b),
        Output::new("C", scatter_c),
    ]
}

/// Run the demonstration: evaluate, merge the outputs and drop the opaque column
pub fn run_demo(rows: usize) -> Result<(Table, EvalStats)> {
    let table = demo_table(rows)?;
    let outputs = evaluate(&table, &mut demo_model, &demo_inputs(), &demo_outputs())?;
    let stats = outputs.stats().clone();

    tracing::info!(rows = stats.rows, elapsed = ?stats.execution_time, "demo evaluated");

    let merged = table.with_outputs(outputs)?.drop_columns(&["Z"])?;
    Ok((merged, stats))
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Number of iterations
    pub iterations: usize,

    /// Warmup iterations
    pub warmup_iterations: usize,

    /// Rows in the evaluated table
    pub rows: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            warmup_iterations: 3,
            rows: 100_000,
        }
    }
}

/// Benchmark result
#[derive(Debug, Clone, Serialize)]
pub struct BenchResult {
    /// Name of the benchmark
    pub name: String,

    /// Total time taken
    pub total_time: Duration,

    /// Average time per iteration
    pub avg_time: Duration,

    /// Min time per iteration
    pub min_time: Duration,

    /// Max time per iteration
    pub max_time: Duration,

    /// Throughput (rows/second)
    pub throughput: f64,
}

/// Run a benchmark
pub fn run_benchmark<F>(name: &str, config: &BenchConfig, mut func: F) -> Result<BenchResult>
where
    F: FnMut() -> Result<()>,
{
    if config.iterations == 0 {
        return Err(Error::InvalidArgument(
            "A benchmark needs at least one iteration".into(),
        ));
    }

    for _ in 0..config.warmup_iterations {
        func()?;
    }

    let mut times = Vec::with_capacity(config.iterations);
    let start_total = Instant::now();

    for _ in 0..config.iterations {
        let start = Instant::now();
        func()?;
        times.push(start.elapsed());
    }

    let total_time = start_total.elapsed();

    let avg_time = times.iter().sum::<Duration>() / u32::try_from(times.len()).unwrap_or(u32::MAX);
    let min_time = times.iter().min().copied().unwrap_or_default();
    let max_time = times.iter().max().copied().unwrap_or_default();

    #[allow(clippy::cast_precision_loss)]
    let throughput = (config.iterations * config.rows) as f64 / total_time.as_secs_f64();

    Ok(BenchResult {
        name: name.to_string(),
        total_time,
        avg_time,
        min_time,
        max_time,
        throughput,
    })
}

/// Benchmark a full evaluation of the demonstration workload
pub fn bench_evaluate(config: &BenchConfig) -> Result<BenchResult> {
    let table = demo_table(config.rows)?;
    let inputs = demo_inputs();
    let outputs = demo_outputs();

    run_benchmark("evaluate", config, || {
        evaluate(&table, &mut demo_model, &inputs, &outputs)?;
        Ok(())
    })
}

/// Benchmark gathering alone, one pass per demo input
pub fn bench_gather(config: &BenchConfig) -> Result<BenchResult> {
    let table = demo_table(config.rows)?;
    let inputs = demo_inputs();

    run_benchmark("gather", config, || {
        let mut model = ml_eval_core::model_fn(|_| Ok(ModelResult::new(())));
        evaluate(&table, &mut model, &inputs, &[])?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nugget_payload_is_deterministic_and_bounded() {
        for x in 0..50 {
            let nugget = Nugget::for_value(x);
            assert_eq!(nugget, Nugget::for_value(x));
            #[allow(clippy::cast_precision_loss)]
            let x = x as f64;
            assert!(nugget.payload().iter().all(|&v| v >= x + 4.0 && v <= x + 11.0));
        }
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn demo_produces_expected_columns() {
        let (table, stats) = run_demo(10).unwrap();
        assert_eq!(stats.rows, 10);
        assert_eq!(stats.inputs, 3);
        assert_eq!(stats.outputs, 3);

        let names: Vec<&str> = table.schema().fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["X", "Y", "A", "B", "C"]);

        let a = table.column("A").unwrap();
        assert_eq!(a.element_type(), ElementType::Int32);
        assert_eq!(a.data().as_i32(), Some(&[0, 3, 6, 9, 12, 15, 18, 21, 24, 27][..]));

        let b = table.column("B").unwrap();
        let c = table.column("C").unwrap();
        assert_eq!(b.element_type(), ElementType::Object);
        for i in 0..10 {
            let y = (i as f64).sqrt();
            let b_value = b.value(i).unwrap().as_f64().unwrap();
            let c_value = c.value(i).unwrap().as_f64().unwrap();
            assert!((b_value - (y + 11.0)).abs() < 1e-12);
            assert!((c_value - (2.0 * y + 43.0).sqrt()).abs() < 1e-12);
        }
    }

    #[test]
    fn gather_2d_lays_out_one_row_per_key() {
        let table = demo_table(4).unwrap();
        let keys = ml_eval_core::RowSet::from_keys([3, 1]).unwrap();
        let index = ml_eval_core::IndexSet::single(&keys);
        let x = table.column("X").unwrap();
        let y = table.column("Y").unwrap();

        let columns = [x as &dyn ColumnSource, y as &dyn ColumnSource];
        let tensor = gather_2d(index.iter(), &columns).unwrap();
        assert_eq!(tensor.shape(), &[2, 2]);
        assert!((tensor.get(&[0, 0]).unwrap() - 3.0).abs() < f64::EPSILON);
        assert!((tensor.get(&[0, 1]).unwrap() - 3f64.sqrt()).abs() < 1e-12);
        assert!((tensor.get(&[1, 1]).unwrap() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn nugget_gather_requires_one_column() {
        let table = demo_table(3).unwrap();
        let inputs = [Input::new(["Z", "X"], gather_nugget)];
        let mut model = ml_eval_core::model_fn(|_| Ok(ModelResult::new(())));

        let err = evaluate(&table, &mut model, &inputs, &[]).unwrap_err();
        assert!(err.to_string().contains("Expected 1 column"));
    }

    #[test]
    fn model_rejects_wrong_arity() {
        assert!(demo_model(vec![BatchTensor::zeros(vec![1, 1])]).is_err());
    }

    #[test]
    fn benchmark_reports_timings() {
        let config = BenchConfig {
            iterations: 2,
            warmup_iterations: 1,
            rows: 64,
        };
        let result = bench_evaluate(&config).unwrap();
        assert_eq!(result.name, "evaluate");
        assert!(result.min_time <= result.max_time);
        assert!(result.throughput > 0.0);

        let empty = BenchConfig {
            iterations: 0,
            ..config
        };
        assert!(bench_gather(&empty).is_err());
    }
}
