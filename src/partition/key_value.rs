use arrow::datatypes::{Schema, SchemaRef};

use crate::{
    error::Result,
    expression::{
        expr::Expression,
        expr_fn::{field, lit},
        values::ScalarValue,
    },
};

use super::Partitioning;

/// The segment value Hive writers use for a null partition value.
pub const HIVE_DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// A raw `key = value` pair extracted from a path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    /// The name of the partition field.
    pub name: String,
    /// The raw value, `None` for a null partition.
    pub value: Option<String>,
}

/// Partitioning schemes that map each segment to a key and a raw value.
pub trait KeyValuePartitioning: Partitioning {
    /// Extracts the key of the segment at position `index`, if it has one.
    fn parse_key(&self, segment: &str, index: usize) -> Option<Key>;
}

/// Converts `key` into an equality on the typed partition field of `schema`.
///
/// Keys naming a field absent from `schema` yield `true`; a value that cannot be
/// parsed as the field's type is an error.
pub fn convert_key(schema: &Schema, key: &Key) -> Result<Expression> {
    let Ok(partition_field) = schema.field_with_name(&key.name) else {
        return Ok(lit(true));
    };

    match &key.value {
        None => Ok(field(&key.name).is_valid().not()),
        Some(value) => {
            let value = ScalarValue::try_from_str(value, partition_field.data_type())?;
            Ok(field(&key.name).eq(lit(value)))
        }
    }
}

/// Partitions by position: the i-th segment holds the value of the i-th schema field.
///
/// e.g. `2009/11` with schema `{year: int16, month: int8}` yields
/// `year == 2009 and month == 11`.
#[derive(Debug, Clone)]
pub struct DirectoryPartitioning {
    schema: SchemaRef,
}

impl DirectoryPartitioning {
    /// Creates a new [`DirectoryPartitioning`] instance.
    pub fn new(schema: SchemaRef) -> Self {
        Self { schema }
    }
}

impl KeyValuePartitioning for DirectoryPartitioning {
    fn parse_key(&self, segment: &str, index: usize) -> Option<Key> {
        self.schema.fields().get(index).map(|field| Key {
            name: field.name().clone(),
            value: Some(segment.to_string()),
        })
    }
}

impl Partitioning for DirectoryPartitioning {
    fn type_name(&self) -> &'static str {
        "directory"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn parse_segment(&self, segment: &str, index: usize) -> Result<Expression> {
        match self.parse_key(segment, index) {
            Some(key) => convert_key(&self.schema, &key),
            None => Ok(lit(true)),
        }
    }
}

/// Partitions by `key=value` segments, in any order.
///
/// Segments without `=` or with an unknown key are ignored.
#[derive(Debug, Clone)]
pub struct HivePartitioning {
    schema: SchemaRef,
}

impl HivePartitioning {
    /// Creates a new [`HivePartitioning`] instance.
    pub fn new(schema: SchemaRef) -> Self {
        Self { schema }
    }

    /// Splits a `key=value` segment.
    pub fn parse_hive_key(segment: &str) -> Option<Key> {
        let (name, value) = segment.split_once('=')?;
        if name.is_empty() {
            return None;
        }
        let value = (value != HIVE_DEFAULT_PARTITION).then(|| value.to_string());

        Some(Key {
            name: name.to_string(),
            value,
        })
    }
}

impl KeyValuePartitioning for HivePartitioning {
    fn parse_key(&self, segment: &str, _index: usize) -> Option<Key> {
        Self::parse_hive_key(segment)
    }
}

impl Partitioning for HivePartitioning {
    fn type_name(&self) -> &'static str {
        "hive"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn parse_segment(&self, segment: &str, index: usize) -> Result<Expression> {
        match self.parse_key(segment, index) {
            Some(key) => convert_key(&self.schema, &key),
            None => Ok(lit(true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::datatypes::{DataType, Field, Schema};

    use crate::{
        expression::expr_fn::{field, lit},
        partition::Partitioning,
    };

    use super::{DirectoryPartitioning, HivePartitioning, Key};

    fn year_month_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("year", DataType::Int32, true),
            Field::new("month", DataType::Int32, true),
        ]))
    }

    #[test]
    fn test_directory_partitioning() {
        let partitioning = DirectoryPartitioning::new(year_month_schema());

        let result = partitioning.parse_path("2009/11").unwrap();
        assert_eq!(result, field("year").eq(lit(2009)).and(field("month").eq(lit(11))));

        let result = partitioning.parse_path("/2009").unwrap();
        assert_eq!(result, field("year").eq(lit(2009)));

        let result = partitioning.parse_path("2009/11/extra").unwrap();
        assert_eq!(result.conjuncts().len(), 2);

        assert!(partitioning.parse_path("").unwrap().is_true());
        assert!(partitioning.parse_path("twenty/11").is_err());
        assert_eq!(partitioning.type_name(), "directory");
    }

    #[test]
    fn test_hive_partitioning() {
        let partitioning = HivePartitioning::new(year_month_schema());

        let result = partitioning
            .parse_path("year=2020/month=07/f.parquet")
            .unwrap();
        assert_eq!(result, field("year").eq(lit(2020)).and(field("month").eq(lit(7))));

        let result = partitioning.parse_path("month=3/data/unknown=1").unwrap();
        assert_eq!(result, field("month").eq(lit(3)));

        let result = partitioning
            .parse_path("year=__HIVE_DEFAULT_PARTITION__")
            .unwrap();
        assert_eq!(result, field("year").is_valid().not());

        assert!(partitioning.parse_path("year=abc").is_err());
        assert_eq!(partitioning.type_name(), "hive");
    }

    #[test]
    fn test_parse_hive_key() {
        assert_eq!(
            HivePartitioning::parse_hive_key("a=b=c"),
            Some(Key {
                name: "a".to_string(),
                value: Some("b=c".to_string())
            })
        );
        assert_eq!(HivePartitioning::parse_hive_key("=1"), None);
        assert_eq!(HivePartitioning::parse_hive_key("plain"), None);
    }
}
