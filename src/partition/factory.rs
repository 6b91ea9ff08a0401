use std::{fmt::Debug, sync::Arc};

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use snafu::location;

use crate::{
    error::{Error, Result},
    expression::coercion::common_type,
    utils::split_segments,
};

use super::{
    key_value::{DirectoryPartitioning, HivePartitioning},
    Partitioning,
};

/// Infers a [`Partitioning`] from a set of partition paths in two phases.
///
/// [`PartitioningFactory::inspect`] derives the partition schema from the paths;
/// [`PartitioningFactory::finish`] binds the fields of that schema, as found in the
/// final dataset schema, into the concrete partitioning.
pub trait PartitioningFactory: Debug + Send + Sync {
    /// A short name identifying the partitioning scheme produced.
    fn type_name(&self) -> &'static str;

    /// Infers the partition schema from `paths`.
    fn inspect(&mut self, paths: &[String]) -> Result<SchemaRef>;

    /// Creates the partitioning for the partition fields of `schema`.
    fn finish(&self, schema: &Schema) -> Result<Arc<dyn Partitioning>>;
}

#[derive(Debug, Clone)]
enum FactoryState {
    Created,
    Inspected(SchemaRef),
}

/// The narrowest type a raw partition value parses as.
fn infer_value_type(value: &str) -> DataType {
    if value.parse::<i32>().is_ok() {
        DataType::Int32
    } else if value.parse::<i64>().is_ok() {
        DataType::Int64
    } else {
        DataType::Utf8
    }
}

/// Accumulates the inferred type of each partition field in order of first appearance.
#[derive(Debug, Default)]
struct FieldInference {
    fields: Vec<(String, Option<DataType>)>,
}

impl FieldInference {
    fn with_names(names: &[String]) -> Self {
        Self {
            fields: names.iter().map(|name| (name.clone(), None)).collect(),
        }
    }

    /// Registers `name`; a `None` value contributes the name without a type.
    fn observe(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        let position = match self.fields.iter().position(|(n, _)| n == name) {
            Some(position) => position,
            None => {
                self.fields.push((name.to_string(), None));
                self.fields.len() - 1
            }
        };
        let Some(value) = value else {
            return Ok(());
        };

        let inferred = infer_value_type(value);
        let current = &mut self.fields[position].1;
        let merged = match current.take() {
            None => inferred,
            Some(existing) if existing == inferred => existing,
            Some(DataType::Int32 | DataType::Int64)
                if matches!(inferred, DataType::Int32 | DataType::Int64) =>
            {
                DataType::Int64
            }
            Some(existing) => {
                return Err(Error::Discovery {
                    message: format!(
                        "Partition field '{}' has conflicting types {} and {}",
                        name, existing, inferred
                    ),
                    location: location!(),
                })
            }
        };
        *current = Some(merged);
        Ok(())
    }

    fn into_schema(self) -> SchemaRef {
        let fields = self
            .fields
            .into_iter()
            .map(|(name, data_type)| Field::new(name, data_type.unwrap_or(DataType::Utf8), true))
            .collect::<Vec<_>>();
        Arc::new(Schema::new(fields))
    }
}

/// Selects the fields of `inspected` from `schema`.
///
/// Each selected field must exist in `schema` with a type the inspected type widens to.
fn select_fields(schema: &Schema, inspected: &Schema) -> Result<SchemaRef> {
    let fields = inspected
        .fields()
        .iter()
        .map(|expected| {
            let field = schema
                .field_with_name(expected.name())
                .map_err(|_| Error::Discovery {
                    message: format!(
                        "Partition field '{}' is missing from schema",
                        expected.name()
                    ),
                    location: location!(),
                })?;
            match common_type(field.data_type(), expected.data_type()) {
                Some(data_type) if &data_type == field.data_type() => Ok(field.clone()),
                _ => Err(Error::Discovery {
                    message: format!(
                        "Partition field '{}' of type {} cannot hold inferred type {}",
                        expected.name(),
                        field.data_type(),
                        expected.data_type()
                    ),
                    location: location!(),
                }),
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(Schema::new(fields)))
}

fn inspected(state: &FactoryState, type_name: &str) -> Result<SchemaRef> {
    match state {
        FactoryState::Inspected(schema) => Ok(schema.clone()),
        FactoryState::Created => Err(Error::InvalidOperation {
            message: format!(
                "Cannot finish {} partitioning factory before inspecting paths",
                type_name
            ),
            location: location!(),
        }),
    }
}

/// Infers a [`DirectoryPartitioning`] over the given field names.
#[derive(Debug, Clone)]
pub struct DirectoryPartitioningFactory {
    field_names: Vec<String>,
    state: FactoryState,
}

impl DirectoryPartitioningFactory {
    /// Creates a new [`DirectoryPartitioningFactory`] instance.
    pub fn new(field_names: Vec<String>) -> Self {
        Self {
            field_names,
            state: FactoryState::Created,
        }
    }
}

impl PartitioningFactory for DirectoryPartitioningFactory {
    fn type_name(&self) -> &'static str {
        "directory"
    }

    fn inspect(&mut self, paths: &[String]) -> Result<SchemaRef> {
        self.state = FactoryState::Created;
        let mut inference = FieldInference::with_names(&self.field_names);
        for path in paths {
            for (name, segment) in self.field_names.iter().zip(split_segments(path)) {
                inference.observe(name, Some(segment))?;
            }
        }

        let schema = inference.into_schema();
        tracing::debug!(partitioning = "directory", schema = %schema, "Inferred partition schema");
        self.state = FactoryState::Inspected(schema.clone());
        Ok(schema)
    }

    fn finish(&self, schema: &Schema) -> Result<Arc<dyn Partitioning>> {
        let inspected = inspected(&self.state, self.type_name())?;
        let schema = select_fields(schema, &inspected)?;
        Ok(Arc::new(DirectoryPartitioning::new(schema)))
    }
}

/// Infers a [`HivePartitioning`] from the `key=value` segments of the paths.
#[derive(Debug, Clone)]
pub struct HivePartitioningFactory {
    state: FactoryState,
}

impl HivePartitioningFactory {
    /// Creates a new [`HivePartitioningFactory`] instance.
    pub fn new() -> Self {
        Self {
            state: FactoryState::Created,
        }
    }
}

impl Default for HivePartitioningFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitioningFactory for HivePartitioningFactory {
    fn type_name(&self) -> &'static str {
        "hive"
    }

    fn inspect(&mut self, paths: &[String]) -> Result<SchemaRef> {
        self.state = FactoryState::Created;
        let mut inference = FieldInference::default();
        for path in paths {
            for segment in split_segments(path) {
                if let Some(key) = HivePartitioning::parse_hive_key(segment) {
                    inference.observe(&key.name, key.value.as_deref())?;
                }
            }
        }

        let schema = inference.into_schema();
        tracing::debug!(partitioning = "hive", schema = %schema, "Inferred partition schema");
        self.state = FactoryState::Inspected(schema.clone());
        Ok(schema)
    }

    fn finish(&self, schema: &Schema) -> Result<Arc<dyn Partitioning>> {
        let inspected = inspected(&self.state, self.type_name())?;
        let schema = select_fields(schema, &inspected)?;
        Ok(Arc::new(HivePartitioning::new(schema)))
    }
}
