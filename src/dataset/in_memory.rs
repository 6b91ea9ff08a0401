use std::sync::Arc;

use arrow::{array::RecordBatch, datatypes::SchemaRef};

use crate::{
    error::Result,
    expression::{expr::Expression, expr_fn::lit},
    scan::options::ScanOptions,
};

use super::{
    fragment::{Fragment, FragmentIterator, InMemoryFragment},
    source::DataSource,
    Dataset,
};

/// A [`DataSource`] yielding one [`InMemoryFragment`] per batch.
#[derive(Debug, Clone)]
pub struct InMemoryDataSource {
    batches: Vec<RecordBatch>,
    partition: Expression,
}

impl InMemoryDataSource {
    /// Creates a new [`InMemoryDataSource`] instance.
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self {
            batches,
            partition: lit(true),
        }
    }
}

impl DataSource for InMemoryDataSource {
    fn type_name(&self) -> &'static str {
        "in-memory"
    }

    fn partition_expression(&self) -> &Expression {
        &self.partition
    }

    fn get_fragments_impl(&self, options: Arc<ScanOptions>) -> Result<FragmentIterator> {
        let batches = self.batches.clone();
        Ok(Box::new(batches.into_iter().map(move |batch| {
            Ok(Arc::new(InMemoryFragment::new(
                batch.schema(),
                vec![batch],
                options.clone(),
            )) as Arc<dyn Fragment>)
        })))
    }
}

/// A [`Dataset`] wrapping record batches held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    schema: SchemaRef,
    sources: Vec<Arc<dyn DataSource>>,
    partition: Expression,
}

impl InMemoryDataset {
    /// Creates an [`InMemoryDataset`] with an explicit `schema` over `batches`.
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        let source = InMemoryDataSource::new(batches);
        Self {
            schema,
            sources: vec![Arc::new(source)],
            partition: lit(true),
        }
    }
}

impl Dataset for InMemoryDataset {
    fn type_name(&self) -> &'static str {
        "in-memory"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn sources(&self) -> &[Arc<dyn DataSource>] {
        &self.sources
    }

    fn partition_expression(&self) -> &Expression {
        &self.partition
    }
}
