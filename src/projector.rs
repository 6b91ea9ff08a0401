use arrow::{
    array::{new_null_array, ArrayRef, RecordBatch, RecordBatchOptions},
    compute::cast,
    datatypes::SchemaRef,
};
use snafu::location;

use crate::{
    error::{Error, Result},
    expression::values::ScalarValue,
};

/// Reconciles record batches of varying physical schemas with a fixed target schema.
///
/// Target fields present in the input are taken by name, without copying when the
/// types agree and cast otherwise. Absent fields are filled with their configured
/// default value, or with nulls when none is configured.
#[derive(Debug, Clone)]
pub struct RecordBatchProjector {
    /// The schema of every produced batch.
    to: SchemaRef,
    /// The fill value per target field.
    defaults: Vec<Option<ScalarValue>>,
    /// The input schema `mapping` was derived from.
    from: Option<SchemaRef>,
    /// The input column index per target field, `None` if absent.
    mapping: Vec<Option<usize>>,
}

impl RecordBatchProjector {
    /// Creates a [`RecordBatchProjector`] producing batches of schema `to`.
    pub fn new(to: SchemaRef) -> Self {
        let num_fields = to.fields().len();
        Self {
            to,
            defaults: vec![None; num_fields],
            from: None,
            mapping: vec![None; num_fields],
        }
    }

    /// The target schema.
    pub fn schema(&self) -> SchemaRef {
        self.to.clone()
    }

    /// Configures the value absent target field `index` is filled with.
    ///
    /// The value must have exactly the field's type; a null value is only
    /// accepted for nullable fields.
    pub fn set_default_value(&mut self, index: usize, value: ScalarValue) -> Result<()> {
        let field = self.to.fields().get(index).ok_or_else(|| Error::InvalidData {
            message: format!(
                "Default value index {} out of bounds for schema with {} fields",
                index,
                self.to.fields().len()
            ),
            location: location!(),
        })?;

        if value.is_null() {
            if !field.is_nullable() {
                return Err(Error::Projection {
                    message: format!(
                        "Cannot use null as default for non-nullable field '{}'",
                        field.name()
                    ),
                    location: location!(),
                });
            }
        } else if &value.data_type() != field.data_type() {
            return Err(Error::Type {
                message: format!(
                    "Default value {} of type {} does not match field '{}' of type {}",
                    value,
                    value.data_type(),
                    field.name(),
                    field.data_type()
                ),
                location: location!(),
            });
        }

        self.defaults[index] = Some(value);
        Ok(())
    }

    /// Derives, for every target field, its column index within `from`.
    pub fn set_input_schema(&mut self, from: SchemaRef) {
        self.mapping = self
            .to
            .fields()
            .iter()
            .map(|field| from.index_of(field.name()).ok())
            .collect();
        self.from = Some(from);
    }

    /// Projects `batch` onto the target schema.
    pub fn project(&mut self, batch: &RecordBatch) -> Result<RecordBatch> {
        if self.from.as_ref() != Some(&batch.schema()) {
            self.set_input_schema(batch.schema());
        }

        let num_rows = batch.num_rows();
        let columns = self
            .to
            .fields()
            .iter()
            .zip(self.mapping.iter().zip(self.defaults.iter()))
            .map(|(field, (index, default))| match (index, default) {
                (Some(index), _) => {
                    let column = batch.column(*index);
                    if column.data_type() == field.data_type() {
                        Ok(column.clone())
                    } else {
                        Ok(cast(column, field.data_type())?)
                    }
                }
                (None, Some(value)) if !value.is_null() => Ok(value.to_array(num_rows)),
                (None, _) if field.is_nullable() => Ok(new_null_array(field.data_type(), num_rows)),
                (None, _) => Err(Error::Projection {
                    message: format!(
                        "Non-nullable field '{}' is absent from the input and has no default",
                        field.name()
                    ),
                    location: location!(),
                }),
            })
            .collect::<Result<Vec<ArrayRef>>>()?;

        let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
        Ok(RecordBatch::try_new_with_options(
            self.to.clone(),
            columns,
            &options,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::{
        array::{Array, AsArray, Int32Array, Int64Array, RecordBatch},
        datatypes::{DataType, Field, Int32Type, Int64Type, Schema},
    };

    use crate::expression::values::ScalarValue;

    use super::RecordBatchProjector;

    fn create_input() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int32, true)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![1, 2, 3]))]).unwrap()
    }

    #[test]
    fn test_projector_default_fill() {
        let to = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int32, true),
            Field::new("b", DataType::Int32, false),
        ]));
        let mut projector = RecordBatchProjector::new(to.clone());
        projector
            .set_default_value(1, ScalarValue::Int32(Some(0)))
            .unwrap();

        let input = create_input();
        let output = projector.project(&input).unwrap();
        assert_eq!(output.schema(), to);
        assert_eq!(output.num_rows(), 3);
        assert_eq!(
            output.column(1).as_primitive::<Int32Type>(),
            &Int32Array::from(vec![0, 0, 0])
        );
        assert!(Arc::ptr_eq(output.column(0), input.column(0)));
    }

    #[test]
    fn test_projector_nulls_and_casts() {
        let to = Arc::new(Schema::new(vec![
            Field::new("c", DataType::Utf8, true),
            Field::new("a", DataType::Int64, true),
        ]));
        let mut projector = RecordBatchProjector::new(to);

        let output = projector.project(&create_input()).unwrap();
        assert_eq!(output.column(0).null_count(), 3);
        assert_eq!(
            output.column(1).as_primitive::<Int64Type>(),
            &Int64Array::from(vec![1, 2, 3])
        );

        let schema = Arc::new(Schema::new(vec![
            Field::new("x", DataType::Int32, true),
            Field::new("a", DataType::Int32, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![9])),
                Arc::new(Int32Array::from(vec![7])),
            ],
        )
        .unwrap();
        let output = projector.project(&batch).unwrap();
        assert_eq!(
            output.column(1).as_primitive::<Int64Type>(),
            &Int64Array::from(vec![7])
        );
    }

    #[test]
    fn test_projector_invalid_defaults() {
        let to = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int32, true),
            Field::new("b", DataType::Int32, false),
        ]));
        let mut projector = RecordBatchProjector::new(to);

        assert!(projector.project(&create_input()).is_err());
        assert!(projector
            .set_default_value(1, ScalarValue::Int64(Some(0)))
            .is_err());
        assert!(projector.set_default_value(1, ScalarValue::Null).is_err());
        assert!(projector.set_default_value(0, ScalarValue::Null).is_ok());
        assert!(projector
            .set_default_value(2, ScalarValue::Int32(Some(0)))
            .is_err());
    }
}
