use std::{fmt::Debug, sync::Arc};

use arrow::{array::RecordBatch, datatypes::SchemaRef};

use crate::{
    error::Result,
    expression::{expr::Expression, expr_fn::lit},
    scan::{
        options::{ScanContext, ScanOptions},
        task::{scan_tasks_from_record_batches, ScanTaskIterator},
    },
};

/// One physical, independently scannable unit of data.
pub trait Fragment: Debug + Send + Sync {
    /// A short name identifying the kind of fragment.
    fn type_name(&self) -> &'static str;

    /// Lazily enumerates the tasks reading this fragment.
    fn scan(&self, context: Arc<ScanContext>) -> Result<ScanTaskIterator>;

    /// Whether the fragment is read by more than one task.
    fn splittable(&self) -> bool;

    /// The options this fragment was bound to.
    fn scan_options(&self) -> &Arc<ScanOptions>;

    /// The predicate every row of this fragment satisfies.
    fn partition_expression(&self) -> &Expression;

    /// The schema of the data as stored, before any projection.
    fn read_physical_schema(&self) -> Result<SchemaRef>;
}

/// A type alias for a lazy, single-pass sequence of [`Fragment`]s.
pub type FragmentIterator = Box<dyn Iterator<Item = Result<Arc<dyn Fragment>>> + Send>;

/// A [`Fragment`] over record batches held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryFragment {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    options: Arc<ScanOptions>,
    partition: Expression,
}

impl InMemoryFragment {
    /// Creates a new [`InMemoryFragment`] instance.
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>, options: Arc<ScanOptions>) -> Self {
        Self {
            schema,
            batches,
            options,
            partition: lit(true),
        }
    }

    /// Attaches the predicate every row of this fragment satisfies.
    pub fn with_partition_expression(mut self, partition: Expression) -> Self {
        self.partition = partition;
        self
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }
}

impl Fragment for InMemoryFragment {
    fn type_name(&self) -> &'static str {
        "in-memory"
    }

    fn scan(&self, context: Arc<ScanContext>) -> Result<ScanTaskIterator> {
        Ok(scan_tasks_from_record_batches(
            self.batches.clone(),
            self.options.clone(),
            context,
        ))
    }

    fn splittable(&self) -> bool {
        false
    }

    fn scan_options(&self) -> &Arc<ScanOptions> {
        &self.options
    }

    fn partition_expression(&self) -> &Expression {
        &self.partition
    }

    fn read_physical_schema(&self) -> Result<SchemaRef> {
        Ok(self.schema.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::TryStreamExt;

    use crate::{
        scan::options::{ScanContext, ScanOptions},
        tests::{create_record_batch, create_schema},
    };

    use super::{Fragment, InMemoryFragment};

    #[tokio::test]
    async fn test_in_memory_fragment_scan() {
        let schema = Arc::new(create_schema());
        let options = Arc::new(ScanOptions::builder(schema.clone()).with_batch_size(1).build().unwrap());
        let fragment = InMemoryFragment::new(schema.clone(), vec![create_record_batch()], options);

        assert_eq!(fragment.type_name(), "in-memory");
        assert!(fragment.partition_expression().is_true());
        assert_eq!(fragment.read_physical_schema().unwrap(), schema);

        let mut num_rows = 0;
        for task in fragment.scan(Arc::new(ScanContext::default())).unwrap() {
            let batches: Vec<_> = task.unwrap().execute().unwrap().try_collect().await.unwrap();
            num_rows += batches.iter().map(|b| b.num_rows()).sum::<usize>();
        }
        assert_eq!(num_rows, 2);
    }
}
