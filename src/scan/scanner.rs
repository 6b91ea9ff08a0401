use std::sync::Arc;

use arrow::{array::RecordBatch, datatypes::SchemaRef};
use arrow_select::concat::concat_batches;
use futures::TryStreamExt;
use itertools::Itertools;
use snafu::location;
use tokio::task::JoinSet;

use crate::{
    dataset::{fragment::Fragment, Dataset},
    error::{Error, Result},
    expression::{
        evaluator::{Evaluator, TreeEvaluator},
        expr::Expression,
        expr_fn::lit,
    },
};

use super::{
    options::{ScanContext, ScanOptions, DEFAULT_BATCH_SIZE},
    task::{FilterAndProjectScanTask, ScanTask, ScanTaskIterator},
};

/// Drains every batch of `task`.
async fn collect_task(task: Arc<dyn ScanTask>) -> Result<Vec<RecordBatch>> {
    task.execute()?.try_collect().await
}

/// A scan over one [`Dataset`] with fixed options.
#[derive(Debug, Clone)]
pub struct Scanner {
    dataset: Arc<dyn Dataset>,
    options: Arc<ScanOptions>,
    context: Arc<ScanContext>,
}

impl Scanner {
    /// Creates a new [`Scanner`] instance.
    pub fn new(dataset: Arc<dyn Dataset>, options: ScanOptions, context: ScanContext) -> Self {
        Self {
            dataset,
            options: Arc::new(options),
            context: Arc::new(context),
        }
    }

    /// The schema of the produced batches.
    pub fn schema(&self) -> SchemaRef {
        self.options.projected_schema()
    }

    pub fn options(&self) -> &Arc<ScanOptions> {
        &self.options
    }

    /// Lazily enumerates the tasks of every fragment that survives partition pruning.
    ///
    /// Each task filters and projects the batches of its fragment; no data is read
    /// before a task executes.
    pub fn scan(&self) -> Result<ScanTaskIterator> {
        let fragments = self.dataset.get_fragments(self.options.clone())?;
        let options = self.options.clone();
        let context = self.context.clone();

        let tasks = fragments.flat_map(move |fragment| -> ScanTaskIterator {
            match Self::fragment_tasks(fragment, options.clone(), context.clone()) {
                Ok(tasks) => tasks,
                Err(e) => Box::new(std::iter::once(Err(e))),
            }
        });
        Ok(Box::new(tasks))
    }

    fn fragment_tasks(
        fragment: Result<Arc<dyn Fragment>>,
        options: Arc<ScanOptions>,
        context: Arc<ScanContext>,
    ) -> Result<ScanTaskIterator> {
        let fragment = fragment?;
        let partition = fragment.partition_expression().clone();
        let tasks = fragment.scan(context.clone())?.map_ok(move |task| {
            Arc::new(FilterAndProjectScanTask::new(
                task,
                &partition,
                options.clone(),
                context.clone(),
            )) as Arc<dyn ScanTask>
        });
        Ok(Box::new(tasks))
    }

    /// Reads every task and concatenates the batches into one.
    ///
    /// With `use_threads`, tasks are drained on the tokio runtime, at most
    /// `max_concurrency` at once; batches keep task order either way.
    pub async fn to_table(&self) -> Result<RecordBatch> {
        let tasks = self.scan()?.collect::<Result<Vec<_>>>()?;
        tracing::debug!(
            dataset = self.dataset.type_name(),
            tasks = tasks.len(),
            use_threads = self.options.use_threads(),
            "Materializing scan"
        );

        let batches = if self.options.use_threads() {
            self.collect_parallel(tasks).await?
        } else {
            let mut batches = vec![];
            for task in tasks {
                batches.extend(collect_task(task).await?);
            }
            batches
        };

        Ok(concat_batches(&self.schema(), &batches)?)
    }

    /// Drains `tasks` on the runtime, keeping task order.
    ///
    /// Returning early drops the [`JoinSet`], which aborts every task still running.
    async fn collect_parallel(&self, tasks: Vec<Arc<dyn ScanTask>>) -> Result<Vec<RecordBatch>> {
        let max_concurrency = self.context.max_concurrency();
        let mut results: Vec<Option<Vec<RecordBatch>>> = vec![None; tasks.len()];
        let mut pending = tasks.into_iter().enumerate();
        let mut running = JoinSet::new();

        for (index, task) in pending.by_ref().take(max_concurrency) {
            running.spawn(async move { (index, collect_task(task).await) });
        }
        while let Some(joined) = running.join_next().await {
            let (index, result) = joined?;
            results[index] = Some(result?);
            if let Some((index, task)) = pending.next() {
                running.spawn(async move { (index, collect_task(task).await) });
            }
        }

        Ok(results.into_iter().flatten().flatten().collect())
    }
}

/// Accumulates the options of a scan over a [`Dataset`].
#[derive(Debug)]
pub struct ScannerBuilder {
    dataset: Arc<dyn Dataset>,
    context: ScanContext,
    projection: Option<Vec<String>>,
    filter: Expression,
    evaluator: Arc<dyn Evaluator>,
    batch_size: usize,
    use_threads: bool,
}

impl ScannerBuilder {
    /// Creates a [`ScannerBuilder`] reading every column of `dataset` unfiltered.
    pub fn new(dataset: Arc<dyn Dataset>, context: ScanContext) -> Self {
        Self {
            dataset,
            context,
            projection: None,
            filter: lit(true),
            evaluator: Arc::new(TreeEvaluator),
            batch_size: DEFAULT_BATCH_SIZE,
            use_threads: false,
        }
    }

    /// Selects the columns to produce, in order.
    pub fn project(mut self, columns: Vec<String>) -> Result<Self> {
        let schema = self.dataset.schema();
        if let Some(missing) = columns
            .iter()
            .find(|column| schema.column_with_name(column).is_none())
        {
            return Err(Error::InvalidData {
                message: format!(
                    "Column with name '{}' could not be found in schema",
                    missing
                ),
                location: location!(),
            });
        }

        self.projection = Some(columns);
        Ok(self)
    }

    /// Sets the predicate rows must satisfy; it must be a valid boolean expression.
    pub fn filter(mut self, filter: Expression) -> Result<Self> {
        let data_type = filter.validate(&self.dataset.schema())?;
        if !matches!(
            data_type,
            arrow::datatypes::DataType::Boolean | arrow::datatypes::DataType::Null
        ) {
            return Err(Error::Type {
                message: format!("Filter '{}' must be boolean, found {}", filter, data_type),
                location: location!(),
            });
        }

        self.filter = filter;
        Ok(self)
    }

    pub fn use_threads(mut self, use_threads: bool) -> Self {
        self.use_threads = use_threads;
        self
    }

    /// Sets the maximum number of rows per batch, which must be positive.
    pub fn batch_size(mut self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidData {
                message: "Batch size must be greater than zero".to_string(),
                location: location!(),
            });
        }

        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Freezes the accumulated options into a [`Scanner`].
    pub fn finish(self) -> Result<Scanner> {
        let options = ScanOptions::builder(self.dataset.schema())
            .with_projection(self.projection)
            .with_filter(self.filter)
            .with_evaluator(self.evaluator)
            .with_batch_size(self.batch_size)
            .with_use_threads(self.use_threads)
            .build()?;

        Ok(Scanner::new(self.dataset, options, self.context))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::{
        array::{Int64Array, RecordBatch, StringArray},
        datatypes::{DataType, Field, Schema},
        util::pretty::pretty_format_batches,
    };
    use futures::TryStreamExt;

    use crate::{
        dataset::{in_memory::InMemoryDataset, union::UnionDataset, Dataset},
        expression::{
            evaluator::NullEvaluator,
            expr_fn::{field, lit},
        },
        scan::options::ScanContext,
        tests::{create_record_batch, create_record_batch_with_nulls, create_schema},
    };

    fn create_dataset() -> Arc<dyn Dataset> {
        Arc::new(InMemoryDataset::new(
            Arc::new(create_schema()),
            vec![create_record_batch(), create_record_batch_with_nulls()],
        ))
    }

    #[tokio::test]
    async fn test_scanner_to_table() {
        let scanner = create_dataset()
            .new_scan(ScanContext::default())
            .project(vec!["c2".to_string(), "c1".to_string()])
            .unwrap()
            .filter(field("c2").gt_eq(lit(2_i64)))
            .unwrap()
            .finish()
            .unwrap();

        let table = scanner.to_table().await.unwrap();
        assert_eq!(table.schema(), scanner.schema());
        let expected = vec![
            "+----+-------+",
            "| c2 | c1    |",
            "+----+-------+",
            "| 2  | world |",
            "| 2  |       |",
            "+----+-------+",
        ];
        assert_eq!(
            pretty_format_batches(&[table]).unwrap().to_string(),
            expected.join("\n")
        );
    }

    #[tokio::test]
    async fn test_scanner_scan_matches_to_table() {
        for batch_size in [1, 2, 1024] {
            for use_threads in [false, true] {
                let scanner = create_dataset()
                    .new_scan(ScanContext::default().with_max_concurrency(2))
                    .batch_size(batch_size)
                    .unwrap()
                    .use_threads(use_threads)
                    .finish()
                    .unwrap();

                let mut num_rows = 0;
                for task in scanner.scan().unwrap() {
                    let batches: Vec<RecordBatch> =
                        task.unwrap().execute().unwrap().try_collect().await.unwrap();
                    num_rows += batches.iter().map(|b| b.num_rows()).sum::<usize>();
                }
                assert_eq!(num_rows, 5);
                assert_eq!(scanner.to_table().await.unwrap().num_rows(), num_rows);
            }
        }
    }

    #[tokio::test]
    async fn test_scanner_with_divergent_fragment_schemas() {
        // the second child lacks `c3`, which is filled with nulls
        let schema = Arc::new(create_schema());
        let narrow = Arc::new(Schema::new(vec![
            Field::new("c1", DataType::Utf8, true),
            Field::new("c2", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            narrow,
            vec![
                Arc::new(StringArray::from(vec!["x"])),
                Arc::new(Int64Array::from(vec![7])),
            ],
        )
        .unwrap();
        let children: Vec<Arc<dyn Dataset>> = vec![
            create_dataset(),
            Arc::new(InMemoryDataset::new(schema.clone(), vec![batch])),
        ];
        let dataset: Arc<dyn Dataset> =
            Arc::new(UnionDataset::try_new(schema, children).unwrap());

        let table = dataset
            .new_scan(ScanContext::default())
            .filter(field("c2").gt(lit(5_i64)))
            .unwrap()
            .finish()
            .unwrap()
            .to_table()
            .await
            .unwrap();
        let expected = vec![
            "+----+----+----+",
            "| c1 | c2 | c3 |",
            "+----+----+----+",
            "| x  | 7  |    |",
            "+----+----+----+",
        ];
        assert_eq!(
            pretty_format_batches(&[table]).unwrap().to_string(),
            expected.join("\n")
        );
    }

    #[test]
    fn test_scanner_builder_validation() {
        let dataset = create_dataset();
        let builder = || dataset.clone().new_scan(ScanContext::default());

        assert!(builder().project(vec!["missing".to_string()]).is_err());
        assert!(builder().filter(field("missing").eq(lit(1))).is_err());
        assert!(builder().filter(field("c2")).is_err());
        assert!(builder().filter(field("c1").eq(lit(true))).is_err());
        assert!(builder().batch_size(0).is_err());
        assert!(builder().use_threads(true).finish().is_ok());
    }

    #[tokio::test]
    async fn test_scanner_null_evaluator() {
        let scanner = create_dataset()
            .new_scan(ScanContext::default())
            .evaluator(Arc::new(NullEvaluator))
            .finish()
            .unwrap();
        assert_eq!(scanner.to_table().await.unwrap().num_rows(), 5);

        let scanner = create_dataset()
            .new_scan(ScanContext::default())
            .evaluator(Arc::new(NullEvaluator))
            .filter(field("c2").eq(lit(1_i64)))
            .unwrap()
            .finish()
            .unwrap();
        assert!(scanner.to_table().await.is_err());
    }

    #[tokio::test]
    async fn test_scanner_threaded_keeps_order_and_fails() {
        let dataset = Arc::new(
            UnionDataset::try_new(
                Arc::new(create_schema()),
                vec![create_dataset(), create_dataset(), create_dataset()],
            )
            .unwrap(),
        ) as Arc<dyn Dataset>;
        let context = ScanContext::default().with_max_concurrency(2);

        let sequential = dataset
            .clone()
            .new_scan(context.clone())
            .finish()
            .unwrap()
            .to_table()
            .await
            .unwrap();
        let threaded = dataset
            .clone()
            .new_scan(context.clone())
            .use_threads(true)
            .finish()
            .unwrap()
            .to_table()
            .await
            .unwrap();
        assert_eq!(threaded, sequential);
        assert_eq!(threaded.num_rows(), 15);

        let scanner = dataset
            .new_scan(context)
            .use_threads(true)
            .evaluator(Arc::new(NullEvaluator))
            .filter(field("c2").eq(lit(1_i64)))
            .unwrap()
            .finish()
            .unwrap();
        assert!(scanner.to_table().await.is_err());
    }
}
