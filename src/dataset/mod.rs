use std::{fmt::Debug, sync::Arc};

use arrow::datatypes::SchemaRef;

use crate::{
    error::Result,
    expression::{expr::Expression, expr_fn::lit},
    scan::{options::ScanContext, options::ScanOptions, scanner::ScannerBuilder},
};

pub mod file_system;
pub mod fragment;
pub mod in_memory;
pub mod source;
pub mod union;

use fragment::{Fragment, FragmentIterator};
use source::DataSource;

/// Flattens a sequence of fragment sequences, surfacing each failure in place.
pub(crate) fn flatten_fragments(
    iterators: impl Iterator<Item = Result<FragmentIterator>> + Send + 'static,
) -> FragmentIterator {
    Box::new(iterators.flat_map(|fragments| -> FragmentIterator {
        match fragments {
            Ok(fragments) => fragments,
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }))
}

/// One or more [`DataSource`]s unified under a single schema.
pub trait Dataset: Debug + Send + Sync {
    /// A short name identifying the kind of dataset.
    fn type_name(&self) -> &'static str;

    /// The schema every fragment is projected onto.
    fn schema(&self) -> SchemaRef;

    fn sources(&self) -> &[Arc<dyn DataSource>];

    /// The predicate every row of this dataset satisfies.
    fn partition_expression(&self) -> &Expression;

    /// The fragments of every source that may hold rows satisfying the filter of `options`.
    fn get_fragments(&self, options: Arc<ScanOptions>) -> Result<FragmentIterator> {
        if !options
            .filter()
            .assume(self.partition_expression())
            .is_satisfiable()
        {
            tracing::trace!(dataset = self.type_name(), partition = %self.partition_expression(), "Pruned dataset");
            return Ok(Box::new(std::iter::empty()));
        }

        let sources = self.sources().to_vec();
        Ok(flatten_fragments(
            sources
                .into_iter()
                .map(move |source| source.get_fragments(options.clone())),
        ))
    }
}

impl dyn Dataset {
    /// Starts building a scan over this dataset.
    pub fn new_scan(self: Arc<Self>, context: ScanContext) -> ScannerBuilder {
        ScannerBuilder::new(self, context)
    }
}

/// A [`Dataset`] over caller-assembled data sources.
#[derive(Debug, Clone)]
pub struct SimpleDataset {
    schema: SchemaRef,
    sources: Vec<Arc<dyn DataSource>>,
    partition: Expression,
}

impl SimpleDataset {
    /// Creates a new [`SimpleDataset`] instance.
    pub fn new(schema: SchemaRef, sources: Vec<Arc<dyn DataSource>>) -> Self {
        Self {
            schema,
            sources,
            partition: lit(true),
        }
    }

    /// Attaches the predicate every row of this dataset satisfies.
    pub fn with_partition_expression(mut self, partition: Expression) -> Self {
        self.partition = partition;
        self
    }
}

impl Dataset for SimpleDataset {
    fn type_name(&self) -> &'static str {
        "simple"
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

/// Collects every fragment of `dataset` for a scan reading all columns.
pub fn collect_fragments(dataset: &dyn Dataset) -> Result<Vec<Arc<dyn Fragment>>> {
    let options = Arc::new(ScanOptions::new(dataset.schema()));
    dataset.get_fragments(options)?.collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        dataset::{
            fragment::{Fragment, InMemoryFragment},
            source::{DataSource, SimpleDataSource},
        },
        expression::expr_fn::{field, lit},
        scan::options::ScanOptions,
        tests::{create_record_batch, create_schema},
    };

    use super::{collect_fragments, Dataset, SimpleDataset};

    #[test]
    fn test_simple_dataset() {
        let schema = Arc::new(create_schema());
        let options = Arc::new(ScanOptions::new(schema.clone()));
        let fragment: Arc<dyn Fragment> = Arc::new(InMemoryFragment::new(
            schema.clone(),
            vec![create_record_batch()],
            options,
        ));
        let sources: Vec<Arc<dyn DataSource>> = vec![
            Arc::new(SimpleDataSource::new(vec![fragment.clone()])),
            Arc::new(SimpleDataSource::new(vec![fragment.clone(), fragment])),
        ];

        let dataset = SimpleDataset::new(schema.clone(), sources);
        assert_eq!(dataset.type_name(), "simple");
        assert_eq!(dataset.schema(), schema);
        assert_eq!(dataset.sources().len(), 2);
        assert_eq!(collect_fragments(&dataset).unwrap().len(), 3);

        let dataset = dataset.with_partition_expression(field("c1").eq(lit("x")));
        let options = Arc::new(
            ScanOptions::builder(schema)
                .with_filter(field("c1").eq(lit("y")))
                .build()
                .unwrap(),
        );
        assert_eq!(dataset.get_fragments(options).unwrap().count(), 0);
    }
}
