use std::sync::Arc;

use arrow::datatypes::{Schema, SchemaRef};

use crate::{
    error::Result,
    expression::{expr::Expression, expr_fn::lit},
};

use super::Partitioning;

/// A [`Partitioning`] that never derives any partition information.
#[derive(Debug, Clone)]
pub struct DefaultPartitioning {
    schema: SchemaRef,
}

impl DefaultPartitioning {
    /// Creates a new [`DefaultPartitioning`] with an empty schema.
    pub fn new() -> Self {
        Self {
            schema: Arc::new(Schema::empty()),
        }
    }
}

impl Default for DefaultPartitioning {
    fn default() -> Self {
        Self::new()
    }
}

impl Partitioning for DefaultPartitioning {
    fn type_name(&self) -> &'static str {
        "default"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn parse_segment(&self, _segment: &str, _index: usize) -> Result<Expression> {
        Ok(lit(true))
    }
}

#[cfg(test)]
mod tests {
    use crate::partition::Partitioning;

    use super::DefaultPartitioning;

    #[test]
    fn test_default_partitioning() {
        let partitioning = DefaultPartitioning::new();

        assert_eq!(partitioning.type_name(), "default");
        assert!(partitioning.schema().fields().is_empty());
        assert!(partitioning.parse_path("a/1/x.csv").unwrap().is_true());
    }
}
