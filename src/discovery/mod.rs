use std::{fmt::Debug, sync::Arc};

use arrow_schema::{DataType, Field, Schema, SchemaRef};
use snafu::location;

use crate::{
    dataset::{union::UnionDataset, Dataset},
    error::{Error, Result},
    expression::{coercion::common_type, expr::Expression, expr_fn::lit},
};

pub mod file_system;

/// Assembles a [`Dataset`] in two phases.
///
/// The inspect methods read the schemas of the underlying sources; [`DatasetFactory::finish`]
/// binds the final schema and builds the dataset. Once finished, a factory rejects
/// every further call.
pub trait DatasetFactory: Debug + Send + Sync {
    /// A short name identifying the kind of dataset produced.
    fn type_name(&self) -> &'static str;

    /// The schema of every source, and of the partitioning if any, before unification.
    fn inspect_schemas(&mut self) -> Result<Vec<SchemaRef>>;

    /// Unifies the inspected schemas into one, widening compatible types.
    fn inspect_schema(&mut self) -> Result<SchemaRef>;

    /// Builds the dataset with `schema`, or with the inspected schema if `None`.
    fn finish(&mut self, schema: Option<SchemaRef>) -> Result<Arc<dyn Dataset>>;

    /// The predicate every row of the dataset satisfies.
    fn root_partition(&self) -> &Expression;

    /// Replaces the root partition; it must be a boolean expression over the inspected schema.
    fn set_root_partition(&mut self, partition: Expression) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FactoryPhase {
    Inspecting,
    Finished,
}

/// The state shared by every [`DatasetFactory`].
#[derive(Debug, Clone)]
pub(crate) struct FactoryState {
    type_name: &'static str,
    phase: FactoryPhase,
    inspected: Option<SchemaRef>,
    root_partition: Expression,
}

impl FactoryState {
    pub(crate) fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            phase: FactoryPhase::Inspecting,
            inspected: None,
            root_partition: lit(true),
        }
    }

    pub(crate) fn ensure_inspecting(&self) -> Result<()> {
        match self.phase {
            FactoryPhase::Inspecting => Ok(()),
            FactoryPhase::Finished => Err(Error::InvalidOperation {
                message: format!("The {} dataset factory is already finished", self.type_name),
                location: location!(),
            }),
        }
    }

    pub(crate) fn inspected(&self) -> Option<&SchemaRef> {
        self.inspected.as_ref()
    }

    pub(crate) fn set_inspected(&mut self, schema: Option<SchemaRef>) {
        self.inspected = schema;
    }

    pub(crate) fn root_partition(&self) -> &Expression {
        &self.root_partition
    }

    pub(crate) fn set_root_partition(&mut self, partition: Expression) -> Result<()> {
        self.ensure_inspecting()?;
        if let Some(schema) = &self.inspected {
            validate_partition(&partition, schema)?;
        }
        self.root_partition = partition;
        Ok(())
    }

    /// Resolves the schema to finish with and validates the root partition against it.
    pub(crate) fn resolve_schema(&self, schema: Option<SchemaRef>) -> Result<SchemaRef> {
        self.ensure_inspecting()?;
        let schema = match schema.or_else(|| self.inspected.clone()) {
            Some(schema) => schema,
            None => {
                return Err(Error::InvalidOperation {
                    message: format!(
                        "Cannot finish the {} dataset factory without a schema before inspecting",
                        self.type_name
                    ),
                    location: location!(),
                })
            }
        };
        validate_partition(&self.root_partition, &schema)?;
        Ok(schema)
    }

    pub(crate) fn finish(&mut self) {
        self.phase = FactoryPhase::Finished;
    }
}

/// Ensures `partition` is a valid boolean expression over `schema`.
pub(crate) fn validate_partition(partition: &Expression, schema: &Schema) -> Result<()> {
    let data_type = partition.validate(schema)?;
    if !matches!(data_type, DataType::Boolean | DataType::Null) {
        return Err(Error::Type {
            message: format!(
                "Partition expression '{}' must be boolean, found {}",
                partition, data_type
            ),
            location: location!(),
        });
    }
    Ok(())
}

/// Merges schemas field by field, in order of first appearance.
///
/// Fields of the same name are widened to their common type; a field missing from
/// any merged schema becomes nullable.
#[derive(Debug, Default)]
pub struct SchemaUnifier {
    fields: Vec<Field>,
    occurrences: Vec<usize>,
    num_schemas: usize,
}

impl SchemaUnifier {
    /// Merges `schema`, leaving the unifier untouched if any field conflicts.
    pub fn try_merge(&mut self, schema: &Schema) -> Result<()> {
        let mut merged = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let position = self.fields.iter().position(|f| f.name() == field.name());
            let data_type = match position {
                Some(position) => {
                    let existing = self.fields[position].data_type();
                    common_type(existing, field.data_type()).ok_or_else(|| Error::Discovery {
                        message: format!(
                            "Unable to merge field '{}' of types {} and {}",
                            field.name(),
                            existing,
                            field.data_type()
                        ),
                        location: location!(),
                    })?
                }
                None => field.data_type().clone(),
            };
            merged.push((position, data_type, field));
        }

        for (position, data_type, field) in merged {
            match position {
                Some(position) => {
                    let nullable = self.fields[position].is_nullable() || field.is_nullable();
                    self.fields[position] = Field::new(field.name(), data_type, nullable);
                    self.occurrences[position] += 1;
                }
                None => {
                    self.fields.push(field.as_ref().clone());
                    self.occurrences.push(1);
                }
            }
        }
        self.num_schemas += 1;
        Ok(())
    }

    /// The unified schema.
    pub fn finish(self) -> SchemaRef {
        let num_schemas = self.num_schemas;
        let fields = self
            .fields
            .into_iter()
            .zip(self.occurrences)
            .map(|(field, occurrences)| {
                let nullable = field.is_nullable() || occurrences < num_schemas;
                field.with_nullable(nullable)
            })
            .collect::<Vec<_>>();
        Arc::new(Schema::new(fields))
    }
}

/// Unifies `schemas` with a [`SchemaUnifier`], failing on the first conflict.
pub fn unify_schemas(schemas: &[SchemaRef]) -> Result<SchemaRef> {
    let mut unifier = SchemaUnifier::default();
    for schema in schemas {
        unifier.try_merge(schema)?;
    }
    Ok(unifier.finish())
}

/// Assembles a [`UnionDataset`] from child factories.
#[derive(Debug)]
pub struct UnionDatasetFactory {
    factories: Vec<Box<dyn DatasetFactory>>,
    state: FactoryState,
}

impl UnionDatasetFactory {
    /// Creates a new [`UnionDatasetFactory`] instance.
    pub fn new(factories: Vec<Box<dyn DatasetFactory>>) -> Self {
        Self {
            factories,
            state: FactoryState::new("union"),
        }
    }

    pub fn factories(&self) -> &[Box<dyn DatasetFactory>] {
        &self.factories
    }
}

impl DatasetFactory for UnionDatasetFactory {
    fn type_name(&self) -> &'static str {
        "union"
    }

    /// The unified schema of each child factory, in child order.
    fn inspect_schemas(&mut self) -> Result<Vec<SchemaRef>> {
        self.state.ensure_inspecting()?;
        self.factories
            .iter_mut()
            .map(|factory| factory.inspect_schema())
            .collect()
    }

    fn inspect_schema(&mut self) -> Result<SchemaRef> {
        let schema = unify_schemas(&self.inspect_schemas()?)?;
        tracing::debug!(factory = "union", schema = %schema, "Inspected dataset schema");
        self.state.set_inspected(Some(schema.clone()));
        Ok(schema)
    }

    /// Finishes every child with the union schema.
    fn finish(&mut self, schema: Option<SchemaRef>) -> Result<Arc<dyn Dataset>> {
        let schema = self.state.resolve_schema(schema)?;
        let children = self
            .factories
            .iter_mut()
            .map(|factory| factory.finish(Some(schema.clone())))
            .collect::<Result<Vec<_>>>()?;

        let dataset = UnionDataset::try_new(schema, children)?
            .with_partition_expression(self.state.root_partition().clone());
        self.state.finish();
        Ok(Arc::new(dataset))
    }

    fn root_partition(&self) -> &Expression {
        self.state.root_partition()
    }

    fn set_root_partition(&mut self, partition: Expression) -> Result<()> {
        self.state.set_root_partition(partition)
    }
}
