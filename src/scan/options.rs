use std::sync::Arc;

use arrow::datatypes::{DataType, Schema, SchemaRef};
use snafu::location;

use crate::{
    error::{Error, Result},
    expression::{
        evaluator::{Evaluator, TreeEvaluator},
        expr::Expression,
        expr_fn::lit,
    },
};

/// The default number of rows per produced batch.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// A builder for [`ScanOptions`].
#[derive(Debug)]
pub struct ScanOptionsBuilder {
    /// The schema of the scanned dataset.
    dataset_schema: SchemaRef,
    /// The names of the columns to produce; all columns if `None`.
    projection: Option<Vec<String>>,
    /// The predicate rows must satisfy.
    filter: Expression,
    /// The evaluator applying `filter`.
    evaluator: Arc<dyn Evaluator>,
    /// The maximum number of rows per batch.
    batch_size: usize,
    /// Whether tasks are drained concurrently.
    use_threads: bool,
}

impl ScanOptionsBuilder {
    /// Creates a [`ScanOptionsBuilder`] for a dataset with `dataset_schema`.
    pub fn new(dataset_schema: SchemaRef) -> Self {
        Self {
            dataset_schema,
            projection: None,
            filter: lit(true),
            evaluator: Arc::new(TreeEvaluator),
            batch_size: DEFAULT_BATCH_SIZE,
            use_threads: false,
        }
    }

    /// Adds the names of the columns to produce.
    pub fn with_projection(mut self, projection: Option<Vec<String>>) -> Self {
        self.projection = projection;
        self
    }

    /// Adds the predicate rows must satisfy.
    pub fn with_filter(mut self, filter: Expression) -> Self {
        self.filter = filter;
        self
    }

    /// Adds the evaluator applying the filter.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Adds the maximum number of rows per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Adds a boolean flag, whether tasks are drained concurrently.
    pub fn with_use_threads(mut self, use_threads: bool) -> Self {
        self.use_threads = use_threads;
        self
    }

    /// Validates the accumulated options and builds the final [`ScanOptions`].
    pub fn build(self) -> Result<ScanOptions> {
        if self.batch_size == 0 {
            return Err(Error::InvalidData {
                message: "Batch size must be greater than zero".to_string(),
                location: location!(),
            });
        }

        let filter_type = self.filter.validate(&self.dataset_schema)?;
        if !matches!(filter_type, DataType::Boolean | DataType::Null) {
            return Err(Error::Type {
                message: format!(
                    "Filter '{}' must be boolean, found {}",
                    self.filter, filter_type
                ),
                location: location!(),
            });
        }

        let projected_schema = match &self.projection {
            None => self.dataset_schema.clone(),
            Some(columns) => {
                let fields = columns
                    .iter()
                    .map(|name| {
                        self.dataset_schema
                            .field_with_name(name)
                            .cloned()
                            .map_err(|_| Error::InvalidData {
                                message: format!(
                                    "Column with name '{}' could not be found in schema",
                                    name
                                ),
                                location: location!(),
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Arc::new(Schema::new(fields))
            }
        };

        let filter_refs = self.filter.field_refs();
        let materialized = self
            .dataset_schema
            .fields()
            .iter()
            .filter(|field| {
                projected_schema.column_with_name(field.name()).is_some()
                    || filter_refs.contains(&field.name().as_str())
            })
            .cloned()
            .collect::<Vec<_>>();

        Ok(ScanOptions {
            dataset_schema: self.dataset_schema,
            projected_schema,
            materialized_schema: Arc::new(Schema::new(materialized)),
            filter: self.filter,
            evaluator: self.evaluator,
            batch_size: self.batch_size,
            use_threads: self.use_threads,
        })
    }
}

/// The immutable parameters of a scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// The schema of the scanned dataset.
    dataset_schema: SchemaRef,
    /// The columns produced by the scan, in output order.
    projected_schema: SchemaRef,
    /// The dataset columns read from fragments: the projection plus the filter's fields.
    materialized_schema: SchemaRef,
    /// The predicate rows must satisfy.
    filter: Expression,
    /// The evaluator applying `filter`.
    evaluator: Arc<dyn Evaluator>,
    /// The maximum number of rows per batch.
    batch_size: usize,
    /// Whether tasks are drained concurrently.
    use_threads: bool,
}

impl ScanOptions {
    /// Creates [`ScanOptions`] reading every column of `dataset_schema` unfiltered.
    pub fn new(dataset_schema: SchemaRef) -> Self {
        let filter = lit(true);
        Self {
            projected_schema: dataset_schema.clone(),
            materialized_schema: dataset_schema.clone(),
            dataset_schema,
            filter,
            evaluator: Arc::new(TreeEvaluator),
            batch_size: DEFAULT_BATCH_SIZE,
            use_threads: false,
        }
    }

    /// Creates a [`ScanOptionsBuilder`].
    pub fn builder(dataset_schema: SchemaRef) -> ScanOptionsBuilder {
        ScanOptionsBuilder::new(dataset_schema)
    }

    pub fn dataset_schema(&self) -> SchemaRef {
        self.dataset_schema.clone()
    }

    pub fn projected_schema(&self) -> SchemaRef {
        self.projected_schema.clone()
    }

    pub fn materialized_schema(&self) -> SchemaRef {
        self.materialized_schema.clone()
    }

    pub fn filter(&self) -> &Expression {
        &self.filter
    }

    pub fn evaluator(&self) -> &Arc<dyn Evaluator> {
        &self.evaluator
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn use_threads(&self) -> bool {
        self.use_threads
    }
}

/// The execution environment of a scan.
#[derive(Debug, Clone)]
pub struct ScanContext {
    /// The maximum number of tasks drained at once when threads are used.
    max_concurrency: usize,
}

impl ScanContext {
    /// Creates a [`ScanContext`] using one worker per CPU.
    pub fn new() -> Self {
        Self {
            max_concurrency: num_cpus::get(),
        }
    }

    /// Adds the maximum number of tasks drained at once, at least one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

impl Default for ScanContext {
    fn default() -> Self {
        Self::new()
    }
}
