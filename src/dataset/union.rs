use std::sync::Arc;

use arrow_schema::SchemaRef;
use snafu::location;

use crate::{
    error::{Error, Result},
    expression::{expr::Expression, expr_fn::lit},
    scan::options::ScanOptions,
};

use super::{flatten_fragments, fragment::FragmentIterator, source::DataSource, Dataset};

/// A [`Dataset`] concatenating child datasets that share one schema.
#[derive(Debug, Clone)]
pub struct UnionDataset {
    schema: SchemaRef,
    children: Vec<Arc<dyn Dataset>>,
    /// The sources of all children, in child order.
    sources: Vec<Arc<dyn DataSource>>,
    partition: Expression,
}

impl UnionDataset {
    /// Creates a [`UnionDataset`], failing if any child's schema differs from `schema`.
    pub fn try_new(schema: SchemaRef, children: Vec<Arc<dyn Dataset>>) -> Result<Self> {
        if let Some(child) = children
            .iter()
            .find(|child| child.schema().fields() != schema.fields())
        {
            return Err(Error::Discovery {
                message: format!(
                    "Child {} dataset has schema {} which differs from union schema {}",
                    child.type_name(),
                    child.schema(),
                    schema
                ),
                location: location!(),
            });
        }

        let sources = children
            .iter()
            .flat_map(|child| child.sources().iter().cloned())
            .collect();
        Ok(Self {
            schema,
            children,
            sources,
            partition: lit(true),
        })
    }

    /// Attaches the predicate every row of this dataset satisfies.
    pub fn with_partition_expression(mut self, partition: Expression) -> Self {
        self.partition = partition;
        self
    }

    pub fn children(&self) -> &[Arc<dyn Dataset>] {
        &self.children
    }
}

impl Dataset for UnionDataset {
    fn type_name(&self) -> &'static str {
        "union"
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

    /// Prunes on the union's partition, then defers to every child so that each
    /// prunes by its own partition expression.
    fn get_fragments(&self, options: Arc<ScanOptions>) -> Result<FragmentIterator> {
        if !options.filter().assume(&self.partition).is_satisfiable() {
            tracing::trace!(dataset = "union", partition = %self.partition, "Pruned dataset");
            return Ok(Box::new(std::iter::empty()));
        }

        let children = self.children.clone();
        Ok(flatten_fragments(
            children
                .into_iter()
                .map(move |child| child.get_fragments(options.clone())),
        ))
    }
}
