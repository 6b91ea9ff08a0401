use std::{fmt::Debug, sync::Arc};

use arrow::datatypes::SchemaRef;

use crate::{error::Result, expression::expr::Expression};

use super::Partitioning;

/// A user-supplied `(segment, index) -> Expression` mapping.
pub type SegmentParser = Arc<dyn Fn(&str, usize) -> Result<Expression> + Send + Sync>;

/// A [`Partitioning`] delegating every segment to a [`SegmentParser`].
#[derive(Clone)]
pub struct FunctionPartitioning {
    schema: SchemaRef,
    parser: SegmentParser,
}

impl FunctionPartitioning {
    /// Creates a new [`FunctionPartitioning`] instance.
    pub fn new(schema: SchemaRef, parser: SegmentParser) -> Self {
        Self { schema, parser }
    }
}

impl Debug for FunctionPartitioning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionPartitioning")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Partitioning for FunctionPartitioning {
    fn type_name(&self) -> &'static str {
        "function"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn parse_segment(&self, segment: &str, index: usize) -> Result<Expression> {
        (self.parser)(segment, index)
    }
}
