use std::fmt::Debug;

use arrow::datatypes::SchemaRef;
use itertools::Itertools;

use crate::{error::Result, expression::expr::Expression, utils::split_segments};

pub mod default;
pub mod dictionary;
pub mod factory;
pub mod function;
pub mod key_value;

/// Maps the segments of a partition path to predicate [`Expression`]s.
pub trait Partitioning: Debug + Send + Sync {
    /// A short name identifying the partitioning scheme.
    fn type_name(&self) -> &'static str;

    /// The fields this partitioning can produce expressions for.
    fn schema(&self) -> SchemaRef;

    /// Parses the segment at position `index` of a path.
    ///
    /// Returns the literal `true` for segments that carry no partition information.
    fn parse_segment(&self, segment: &str, index: usize) -> Result<Expression>;

    /// Parses every segment of `path` and conjoins the non-trivial results in segment order.
    fn parse_path(&self, path: &str) -> Result<Expression> {
        let exprs = split_segments(path)
            .into_iter()
            .enumerate()
            .map(|(index, segment)| self.parse_segment(segment, index))
            .filter_ok(|expr| !expr.is_true())
            .collect::<Result<Vec<_>>>()?;

        Ok(Expression::and_all(exprs))
    }
}
