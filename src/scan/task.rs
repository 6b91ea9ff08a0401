use std::{fmt::Debug, sync::Arc};

use arrow_array::RecordBatch;
use async_stream::try_stream;
use futures::StreamExt;

use crate::{
    error::Result,
    expression::{expr::Expression, operator::CompareOperator, values::ScalarValue},
    io::RecordBatchStream,
    projector::RecordBatchProjector,
};

use super::options::{ScanContext, ScanOptions};

/// A deferred, independently executable unit of a scan.
pub trait ScanTask: Debug + Send + Sync {
    /// Produces the batches of this task.
    ///
    /// Every call starts over from the underlying data.
    fn execute(&self) -> Result<RecordBatchStream>;

    /// The options this task was created with.
    fn options(&self) -> &Arc<ScanOptions>;

    /// The context this task was created with.
    fn context(&self) -> &Arc<ScanContext>;
}

/// A type alias for a lazy, single-pass sequence of [`ScanTask`]s.
pub type ScanTaskIterator = Box<dyn Iterator<Item = Result<Arc<dyn ScanTask>>> + Send>;

/// Splits `batch` into zero-copy slices of at most `batch_size` rows.
pub fn chunk_batch(batch: &RecordBatch, batch_size: usize) -> Vec<RecordBatch> {
    let batch_size = batch_size.max(1);
    (0..batch.num_rows())
        .step_by(batch_size)
        .map(|offset| batch.slice(offset, batch_size.min(batch.num_rows() - offset)))
        .collect()
}

/// A [`ScanTask`] replaying a fixed list of batches.
#[derive(Debug, Clone)]
pub struct InMemoryScanTask {
    batches: Vec<RecordBatch>,
    options: Arc<ScanOptions>,
    context: Arc<ScanContext>,
}

impl InMemoryScanTask {
    /// Creates a new [`InMemoryScanTask`] instance.
    pub fn new(
        batches: Vec<RecordBatch>,
        options: Arc<ScanOptions>,
        context: Arc<ScanContext>,
    ) -> Self {
        Self {
            batches,
            options,
            context,
        }
    }
}

impl ScanTask for InMemoryScanTask {
    fn execute(&self) -> Result<RecordBatchStream> {
        let batches = self.batches.clone();
        Ok(futures::stream::iter(batches.into_iter().map(Ok)).boxed())
    }

    fn options(&self) -> &Arc<ScanOptions> {
        &self.options
    }

    fn context(&self) -> &Arc<ScanContext> {
        &self.context
    }
}

/// Turns `batches` into one [`InMemoryScanTask`] per slice of at most `batch_size` rows.
pub fn scan_tasks_from_record_batches(
    batches: Vec<RecordBatch>,
    options: Arc<ScanOptions>,
    context: Arc<ScanContext>,
) -> ScanTaskIterator {
    let batch_size = options.batch_size();
    let tasks = batches
        .into_iter()
        .flat_map(move |batch| chunk_batch(&batch, batch_size))
        .map(move |chunk| {
            Ok(Arc::new(InMemoryScanTask::new(
                vec![chunk],
                options.clone(),
                context.clone(),
            )) as Arc<dyn ScanTask>)
        });
    Box::new(tasks)
}

/// The `field == value` constants a partition expression fixes.
pub fn partition_constants(partition: &Expression) -> Vec<(String, ScalarValue)> {
    partition
        .conjuncts()
        .into_iter()
        .filter_map(|conjunct| match conjunct {
            Expression::Comparison(comparison) => {
                match (comparison.lhs(), comparison.op(), comparison.rhs()) {
                    (Expression::Field(f), op, Expression::Scalar(v))
                    | (Expression::Scalar(v), op, Expression::Field(f))
                        if op == CompareOperator::Eq =>
                    {
                        Some((f.name().to_string(), v.clone()))
                    }
                    _ => None,
                }
            }
            _ => None,
        })
        .collect()
}

/// Wraps a fragment's task, applying the scan's filter and projection to its batches.
///
/// Batches are first projected onto the materialized columns, with partition
/// constants filling columns the fragment lacks, then filtered by the filter
/// simplified against the fragment's partition expression, and finally narrowed
/// to the requested projection.
#[derive(Debug)]
pub struct FilterAndProjectScanTask {
    inner: Arc<dyn ScanTask>,
    /// The scan filter simplified under the fragment's partition expression.
    filter: Expression,
    /// Fill values for materialized columns fixed by the partition expression.
    defaults: Vec<(String, ScalarValue)>,
    options: Arc<ScanOptions>,
    context: Arc<ScanContext>,
}

impl FilterAndProjectScanTask {
    /// Creates a task filtering and projecting `inner` for a fragment with `partition`.
    pub fn new(
        inner: Arc<dyn ScanTask>,
        partition: &Expression,
        options: Arc<ScanOptions>,
        context: Arc<ScanContext>,
    ) -> Self {
        Self {
            inner,
            filter: options.filter().assume(partition),
            defaults: partition_constants(partition),
            options,
            context,
        }
    }

    /// The filter applied to the batches of this task.
    pub fn filter(&self) -> &Expression {
        &self.filter
    }

    fn projector(&self) -> Result<RecordBatchProjector> {
        let schema = self.options.materialized_schema();
        let mut projector = RecordBatchProjector::new(schema.clone());
        for (name, value) in &self.defaults {
            if let Ok(index) = schema.index_of(name) {
                let value = value.cast_to(schema.field(index).data_type())?;
                projector.set_default_value(index, value)?;
            }
        }
        Ok(projector)
    }
}

impl ScanTask for FilterAndProjectScanTask {
    fn execute(&self) -> Result<RecordBatchStream> {
        let mut projector = self.projector()?;
        let materialized = self.options.materialized_schema();
        let indices = self
            .options
            .projected_schema()
            .fields()
            .iter()
            .map(|field| materialized.index_of(field.name()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut input = self.inner.execute()?;
        let filter = self.filter.clone();
        let evaluator = self.options.evaluator().clone();

        let stream = try_stream! {
            while let Some(batch) = input.next().await {
                let batch = projector.project(&batch?)?;
                let batch = if filter.is_true() {
                    batch
                } else {
                    let selection = evaluator.evaluate(&filter, &batch)?;
                    evaluator.filter(&selection, &batch)?
                };
                yield batch.project(&indices)?;
            }
        };

        Ok(stream.boxed())
    }

    fn options(&self) -> &Arc<ScanOptions> {
        &self.options
    }

    fn context(&self) -> &Arc<ScanContext> {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::util::pretty::pretty_format_batches;
    use futures::TryStreamExt;

    use crate::{
        expression::{
            expr_fn::{field, lit},
            values::ScalarValue,
        },
        scan::options::{ScanContext, ScanOptions},
        tests::{create_record_batch, create_schema},
    };

    use super::{
        chunk_batch, partition_constants, scan_tasks_from_record_batches,
        FilterAndProjectScanTask, InMemoryScanTask, ScanTask,
    };

    #[test]
    fn test_chunk_batch() {
        let batch = create_record_batch();
        let chunks = chunk_batch(&batch, 1);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|chunk| chunk.num_rows() == 1));
        assert_eq!(chunk_batch(&batch, 5).len(), 1);
        assert!(chunk_batch(&batch.slice(0, 0), 5).is_empty());
    }

    #[tokio::test]
    async fn test_scan_tasks_from_record_batches() {
        let schema = Arc::new(create_schema());
        let options = Arc::new(ScanOptions::builder(schema).with_batch_size(1).build().unwrap());
        let context = Arc::new(ScanContext::default());
        let batches = vec![create_record_batch(), create_record_batch()];

        let tasks = scan_tasks_from_record_batches(batches, options, context)
            .collect::<crate::error::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(tasks.len(), 4);

        // tasks may be executed repeatedly
        for _ in 0..2 {
            let batches: Vec<_> = tasks[0].execute().unwrap().try_collect().await.unwrap();
            assert_eq!(batches.len(), 1);
            assert_eq!(batches[0].num_rows(), 1);
        }
    }

    #[test]
    fn test_partition_constants() {
        let partition = field("p")
            .eq(lit(1))
            .and(lit("x").eq(field("q")))
            .and(field("r").gt(lit(1)));
        assert_eq!(
            partition_constants(&partition),
            vec![
                ("p".to_string(), ScalarValue::Int32(Some(1))),
                ("q".to_string(), ScalarValue::Utf8(Some("x".to_string()))),
            ]
        );
    }

    #[tokio::test]
    async fn test_filter_and_project_scan_task() {
        let schema = Arc::new(create_schema());
        let options = Arc::new(
            ScanOptions::builder(schema.clone())
                .with_projection(Some(vec!["c1".to_string()]))
                .with_filter(field("c2").gt(lit(1)))
                .build()
                .unwrap(),
        );
        let context = Arc::new(ScanContext::default());
        let inner = Arc::new(InMemoryScanTask::new(
            vec![create_record_batch()],
            options.clone(),
            context.clone(),
        ));

        let task = FilterAndProjectScanTask::new(inner, &lit(true), options, context);
        let batches: Vec<_> = task.execute().unwrap().try_collect().await.unwrap();
        let expected = vec![
            "+-------+",
            "| c1    |",
            "+-------+",
            "| world |",
            "+-------+",
        ];
        assert_eq!(
            pretty_format_batches(&batches).unwrap().to_string(),
            expected.join("\n")
        );
    }

    #[tokio::test]
    async fn test_filter_and_project_scan_task_partition_defaults() {
        // the physical batch lacks `c3`, which the partition fixes to 22
        let dataset_schema = Arc::new(create_schema());
        let physical = create_record_batch().project(&[0, 1]).unwrap();
        let options = Arc::new(
            ScanOptions::builder(dataset_schema)
                .with_projection(Some(vec!["c1".to_string(), "c3".to_string()]))
                .with_filter(field("c3").eq(lit(22_i64)).and(field("c2").eq(lit(1_i64))))
                .build()
                .unwrap(),
        );
        let context = Arc::new(ScanContext::default());
        let inner = Arc::new(InMemoryScanTask::new(
            vec![physical],
            options.clone(),
            context.clone(),
        ));

        let partition = field("c3").eq(lit(22));
        let task = FilterAndProjectScanTask::new(inner, &partition, options, context);
        assert_eq!(task.filter(), &field("c2").eq(lit(1_i64)));

        let batches: Vec<_> = task.execute().unwrap().try_collect().await.unwrap();
        let expected = vec![
            "+-------+----+",
            "| c1    | c3 |",
            "+-------+----+",
            "| hello | 22 |",
            "+-------+----+",
        ];
        assert_eq!(
            pretty_format_batches(&batches).unwrap().to_string(),
            expected.join("\n")
        );
    }
}
