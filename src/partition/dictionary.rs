use ahash::AHashMap;
use arrow::datatypes::SchemaRef;

use crate::{
    error::Result,
    expression::{expr::Expression, expr_fn::lit},
};

use super::Partitioning;

/// A [`Partitioning`] looking up each segment in the dictionary for its position.
///
/// Segments missing from their dictionary, and positions without one, yield `true`.
#[derive(Debug, Clone)]
pub struct SegmentDictionaryPartitioning {
    schema: SchemaRef,
    dictionaries: Vec<AHashMap<String, Expression>>,
}

impl SegmentDictionaryPartitioning {
    /// Creates a new [`SegmentDictionaryPartitioning`] instance.
    pub fn new(schema: SchemaRef, dictionaries: Vec<AHashMap<String, Expression>>) -> Self {
        Self {
            schema,
            dictionaries,
        }
    }
}

impl Partitioning for SegmentDictionaryPartitioning {
    fn type_name(&self) -> &'static str {
        "segment_dictionary"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn parse_segment(&self, segment: &str, index: usize) -> Result<Expression> {
        Ok(self
            .dictionaries
            .get(index)
            .and_then(|dictionary| dictionary.get(segment))
            .cloned()
            .unwrap_or_else(|| lit(true)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ahash::AHashMap;
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::{
        expression::expr_fn::{field, lit},
        partition::Partitioning,
    };

    use super::SegmentDictionaryPartitioning;

    #[test]
    fn test_segment_dictionary_partitioning() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("alpha", DataType::Int32, true),
            Field::new("beta", DataType::Utf8, true),
        ]));
        let first = AHashMap::from([
            ("zero".to_string(), field("alpha").eq(lit(0))),
            ("one".to_string(), field("alpha").eq(lit(1))),
        ]);
        let second = AHashMap::from([("x".to_string(), field("beta").eq(lit("x")))]);
        let partitioning = SegmentDictionaryPartitioning::new(schema, vec![first, second]);

        let result = partitioning.parse_path("one/x").unwrap();
        assert_eq!(result, field("alpha").eq(lit(1)).and(field("beta").eq(lit("x"))));

        let result = partitioning.parse_path("two/x/y").unwrap();
        assert_eq!(result, field("beta").eq(lit("x")));
        assert_eq!(partitioning.type_name(), "segment_dictionary");
    }
}
