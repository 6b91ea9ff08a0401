use std::{fmt::Debug, sync::Arc};

use itertools::Itertools;

use crate::{
    error::Result,
    expression::{expr::Expression, expr_fn::lit},
    scan::options::ScanOptions,
};

use super::{
    flatten_fragments,
    fragment::{Fragment, FragmentIterator},
};

/// A collection of [`Fragment`]s sharing a partition expression.
pub trait DataSource: Debug + Send + Sync {
    /// A short name identifying the kind of source.
    fn type_name(&self) -> &'static str;

    /// The predicate every row of this source satisfies.
    fn partition_expression(&self) -> &Expression;

    /// Every fragment of this source bound to `options`, without any pruning.
    fn get_fragments_impl(&self, options: Arc<ScanOptions>) -> Result<FragmentIterator>;

    /// The fragments of this source that may hold rows satisfying the filter of `options`.
    ///
    /// Nothing is returned when the filter contradicts the source's partition expression;
    /// otherwise fragments contradicting the filter through their own partition
    /// expression are skipped.
    fn get_fragments(&self, options: Arc<ScanOptions>) -> Result<FragmentIterator> {
        if !options
            .filter()
            .assume(self.partition_expression())
            .is_satisfiable()
        {
            tracing::trace!(source = self.type_name(), partition = %self.partition_expression(), "Pruned data source");
            return Ok(Box::new(std::iter::empty()));
        }

        let filter = options.filter().clone();
        let fragments = self.get_fragments_impl(options)?.filter_ok(move |fragment| {
            let keep = filter
                .assume(fragment.partition_expression())
                .is_satisfiable();
            if !keep {
                tracing::trace!(partition = %fragment.partition_expression(), "Pruned fragment");
            }
            keep
        });
        Ok(Box::new(fragments))
    }
}

/// A [`DataSource`] over a fixed list of fragments.
#[derive(Debug, Clone)]
pub struct SimpleDataSource {
    fragments: Vec<Arc<dyn Fragment>>,
    partition: Expression,
}

impl SimpleDataSource {
    /// Creates a new [`SimpleDataSource`] instance.
    pub fn new(fragments: Vec<Arc<dyn Fragment>>) -> Self {
        Self {
            fragments,
            partition: lit(true),
        }
    }

    pub fn fragments(&self) -> &[Arc<dyn Fragment>] {
        &self.fragments
    }
}

impl DataSource for SimpleDataSource {
    fn type_name(&self) -> &'static str {
        "simple"
    }

    fn partition_expression(&self) -> &Expression {
        &self.partition
    }

    /// Returns the fragments as constructed; they keep the options they were built with.
    fn get_fragments_impl(&self, _options: Arc<ScanOptions>) -> Result<FragmentIterator> {
        let fragments = self.fragments.clone();
        Ok(Box::new(fragments.into_iter().map(Ok)))
    }
}

/// A [`DataSource`] concatenating the fragments of its children, in child order.
#[derive(Debug, Clone)]
pub struct TreeDataSource {
    children: Vec<Arc<dyn DataSource>>,
    partition: Expression,
}

impl TreeDataSource {
    /// Creates a new [`TreeDataSource`] instance.
    pub fn new(children: Vec<Arc<dyn DataSource>>) -> Self {
        Self {
            children,
            partition: lit(true),
        }
    }

    /// Attaches the predicate every row of this source satisfies.
    pub fn with_partition_expression(mut self, partition: Expression) -> Self {
        self.partition = partition;
        self
    }

    pub fn children(&self) -> &[Arc<dyn DataSource>] {
        &self.children
    }
}

impl DataSource for TreeDataSource {
    fn type_name(&self) -> &'static str {
        "tree"
    }

    fn partition_expression(&self) -> &Expression {
        &self.partition
    }

    /// Each child prunes by its own partition expression.
    fn get_fragments_impl(&self, options: Arc<ScanOptions>) -> Result<FragmentIterator> {
        let children = self.children.clone();
        Ok(flatten_fragments(
            children
                .into_iter()
                .map(move |child| child.get_fragments(options.clone())),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        dataset::fragment::{Fragment, InMemoryFragment},
        expression::expr_fn::{field, lit},
        scan::options::ScanOptions,
        tests::{create_record_batch, create_schema},
    };

    use super::{DataSource, SimpleDataSource, TreeDataSource};

    fn fragment(partition: i64) -> Arc<dyn Fragment> {
        let schema = Arc::new(create_schema());
        let options = Arc::new(ScanOptions::new(schema.clone()));
        Arc::new(
            InMemoryFragment::new(schema, vec![create_record_batch()], options)
                .with_partition_expression(field("c2").eq(lit(partition))),
        )
    }

    fn options_with_filter(filter: crate::expression::expr::Expression) -> Arc<ScanOptions> {
        Arc::new(
            ScanOptions::builder(Arc::new(create_schema()))
                .with_filter(filter)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_simple_data_source_prunes_fragments() {
        let source = SimpleDataSource::new(vec![fragment(1), fragment(2), fragment(3)]);
        assert_eq!(source.type_name(), "simple");

        let options = options_with_filter(field("c2").gt(lit(1_i64)));
        let fragments = source.get_fragments(options).unwrap().collect::<Vec<_>>();
        assert_eq!(fragments.len(), 2);

        let options = options_with_filter(lit(true));
        assert_eq!(source.get_fragments(options).unwrap().count(), 3);
    }

    #[test]
    fn test_tree_data_source() {
        let first: Arc<dyn DataSource> = Arc::new(SimpleDataSource::new(vec![fragment(1)]));
        let second: Arc<dyn DataSource> = Arc::new(
            TreeDataSource::new(vec![Arc::new(SimpleDataSource::new(vec![
                fragment(2),
                fragment(2),
            ]))])
            .with_partition_expression(field("c1").eq(lit("b"))),
        );
        let tree = TreeDataSource::new(vec![first, second]);
        assert_eq!(tree.type_name(), "tree");

        let fragments = tree
            .get_fragments(options_with_filter(lit(true)))
            .unwrap()
            .collect::<crate::error::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].partition_expression(), &field("c2").eq(lit(1_i64)));

        // the nested tree is pruned by its own partition expression
        let options = options_with_filter(field("c1").eq(lit("a")));
        assert_eq!(tree.get_fragments(options).unwrap().count(), 1);
    }
}
