use std::{fmt::Debug, sync::Arc};

use arrow::{
    array::{Array, AsArray, BooleanArray, Datum, RecordBatch, Scalar},
    buffer::BooleanBuffer,
    compute::{
        and_kleene, cast_with_options, filter_record_batch, is_not_null, kernels::cmp, not,
        or_kleene, CastOptions,
    },
    datatypes::DataType,
};
use snafu::location;

use crate::error::{Error, Result};

use super::{
    coercion::{common_type, Signature},
    expr::{Comparison, Expression, InList, Logical},
    operator::{CompareOperator, Operator},
    values::{ColumnarValue, ScalarValue},
};

/// Evaluates [`Expression`]s against record batches.
pub trait Evaluator: Debug + Send + Sync {
    /// A short name identifying the implementation.
    fn type_name(&self) -> &'static str;

    /// Evaluates `expr` against `batch`.
    fn evaluate(&self, expr: &Expression, batch: &RecordBatch) -> Result<ColumnarValue>;

    /// Keeps the rows of `batch` for which `selection` is true.
    fn filter(&self, selection: &ColumnarValue, batch: &RecordBatch) -> Result<RecordBatch>;

    /// Evaluates `filter` against every batch and keeps the selected rows.
    fn filter_batches(
        &self,
        batches: Vec<RecordBatch>,
        filter: &Expression,
    ) -> Result<Vec<RecordBatch>> {
        batches
            .into_iter()
            .map(|batch| {
                let selection = self.evaluate(filter, &batch)?;
                self.filter(&selection, &batch)
            })
            .collect()
    }
}

/// An [`Evaluator`] walking the expression tree and dispatching to arrow's compute kernels.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeEvaluator;

impl Evaluator for TreeEvaluator {
    fn type_name(&self) -> &'static str {
        "tree"
    }

    fn evaluate(&self, expr: &Expression, batch: &RecordBatch) -> Result<ColumnarValue> {
        use Expression::*;

        match expr {
            Field(field) => batch
                .column_by_name(field.name())
                .map(|column| ColumnarValue::Array(column.clone()))
                .ok_or_else(|| Error::Type {
                    message: format!(
                        "Field with name '{}' could not be found in batch",
                        field.name()
                    ),
                    location: location!(),
                }),
            Scalar(value) => Ok(ColumnarValue::Scalar(value.clone())),
            Not(negation) => match self.evaluate(negation.operand(), batch)? {
                ColumnarValue::Scalar(value) => match value {
                    ScalarValue::Boolean(v) => Ok(ColumnarValue::Scalar(ScalarValue::Boolean(
                        v.map(|v| !v),
                    ))),
                    ScalarValue::Null => Ok(ColumnarValue::Scalar(ScalarValue::Boolean(None))),
                    other => Err(Error::Type {
                        message: format!("Cannot negate non-boolean value {}", other),
                        location: location!(),
                    }),
                },
                operand => {
                    let operand = as_boolean(operand, batch.num_rows())?;
                    Ok(ColumnarValue::Array(Arc::new(not(&operand)?)))
                }
            },
            Cast(cast) => {
                let to = cast.to_type(batch.schema_ref())?;
                let operand = self.evaluate(cast.operand(), batch)?;
                cast_columnar(operand, &to, cast.options())
            }
            And(logical) => self.logical(logical, Operator::And, batch),
            Or(logical) => self.logical(logical, Operator::Or, batch),
            Comparison(cmp) => self.compare(cmp, batch),
            IsValid(is_valid) => match self.evaluate(is_valid.operand(), batch)? {
                ColumnarValue::Scalar(value) => {
                    Ok(ColumnarValue::Scalar(ScalarValue::Boolean(Some(!value.is_null()))))
                }
                ColumnarValue::Array(array) => {
                    Ok(ColumnarValue::Array(Arc::new(is_not_null(&array)?)))
                }
            },
            In(in_list) => self.is_in(in_list, batch),
            Custom(custom) => custom.inner().evaluate(batch),
        }
    }

    fn filter(&self, selection: &ColumnarValue, batch: &RecordBatch) -> Result<RecordBatch> {
        match selection {
            ColumnarValue::Scalar(ScalarValue::Boolean(Some(true))) => Ok(batch.clone()),
            ColumnarValue::Scalar(ScalarValue::Boolean(_) | ScalarValue::Null) => {
                Ok(batch.slice(0, 0))
            }
            ColumnarValue::Scalar(other) => Err(Error::Type {
                message: format!("Cannot filter with non-boolean value {}", other),
                location: location!(),
            }),
            ColumnarValue::Array(array) => {
                let mask = array.as_boolean_opt().ok_or_else(|| Error::Type {
                    message: format!(
                        "Cannot filter with non-boolean array of type {}",
                        array.data_type()
                    ),
                    location: location!(),
                })?;
                Ok(filter_record_batch(batch, mask)?)
            }
        }
    }
}

impl TreeEvaluator {
    fn logical(&self, logical: &Logical, op: Operator, batch: &RecordBatch) -> Result<ColumnarValue> {
        let num_rows = batch.num_rows();
        let lhs = as_boolean(self.evaluate(logical.lhs(), batch)?, num_rows)?;
        let rhs = as_boolean(self.evaluate(logical.rhs(), batch)?, num_rows)?;

        let result = match op {
            Operator::And => and_kleene(&lhs, &rhs)?,
            _ => or_kleene(&lhs, &rhs)?,
        };
        Ok(ColumnarValue::Array(Arc::new(result)))
    }

    fn compare(&self, comparison: &Comparison, batch: &RecordBatch) -> Result<ColumnarValue> {
        let lhs = self.evaluate(comparison.lhs(), batch)?;
        let rhs = self.evaluate(comparison.rhs(), batch)?;
        if lhs.data_type() == DataType::Null || rhs.data_type() == DataType::Null {
            return Ok(ColumnarValue::Scalar(ScalarValue::Boolean(None)));
        }

        let (lhs_type, rhs_type) = Signature::get_input_types(
            &lhs.data_type(),
            &Operator::Compare(comparison.op()),
            &rhs.data_type(),
        )?;
        let both_scalar = matches!(
            (&lhs, &rhs),
            (ColumnarValue::Scalar(_), ColumnarValue::Scalar(_))
        );
        let options = CastOptions::default();
        let lhs = to_datum(cast_columnar(lhs, &lhs_type, &options)?)?;
        let rhs = to_datum(cast_columnar(rhs, &rhs_type, &options)?)?;
        let (lhs, rhs) = (lhs.as_ref(), rhs.as_ref());

        let result = match comparison.op() {
            CompareOperator::Eq => cmp::eq(lhs, rhs)?,
            CompareOperator::NotEq => cmp::neq(lhs, rhs)?,
            CompareOperator::Lt => cmp::lt(lhs, rhs)?,
            CompareOperator::LtEq => cmp::lt_eq(lhs, rhs)?,
            CompareOperator::Gt => cmp::gt(lhs, rhs)?,
            CompareOperator::GtEq => cmp::gt_eq(lhs, rhs)?,
        };

        if both_scalar {
            return Ok(ColumnarValue::Scalar(ScalarValue::try_from_array(&result, 0)?));
        }
        Ok(ColumnarValue::Array(Arc::new(result)))
    }

    /// Or-folds equality against every valid element of the set, starting from `false`
    /// (null where the operand is null).
    fn is_in(&self, in_list: &InList, batch: &RecordBatch) -> Result<ColumnarValue> {
        let operand = self
            .evaluate(in_list.operand(), batch)?
            .into_array(batch.num_rows())?;
        let set = in_list.set();
        let common = common_type(operand.data_type(), set.data_type()).ok_or_else(|| {
            Error::Type {
                message: format!(
                    "Cannot test values of type {} in set of {}",
                    operand.data_type(),
                    set.data_type()
                ),
                location: location!(),
            }
        })?;

        let options = CastOptions::default();
        let operand = cast_with_options(&operand, &common, &options)?;
        let set = cast_with_options(set, &common, &options)?;

        let mut result = BooleanArray::new(
            BooleanBuffer::new_unset(operand.len()),
            operand.nulls().cloned(),
        );
        for i in (0..set.len()).filter(|i| set.is_valid(*i)) {
            let needle = Scalar::new(set.slice(i, 1));
            let hit = cmp::eq(&operand, &needle)?;
            result = or_kleene(&result, &hit)?;
        }
        Ok(ColumnarValue::Array(Arc::new(result)))
    }
}

/// An [`Evaluator`] for contexts without evaluation capability.
///
/// Evaluation fails with a not-supported error, filtering passes batches through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEvaluator;

impl Evaluator for NullEvaluator {
    fn type_name(&self) -> &'static str {
        "null"
    }

    fn evaluate(&self, expr: &Expression, _batch: &RecordBatch) -> Result<ColumnarValue> {
        Err(Error::NotSupported {
            message: format!("Cannot evaluate {} without an evaluator", expr),
            location: location!(),
        })
    }

    fn filter(&self, _selection: &ColumnarValue, batch: &RecordBatch) -> Result<RecordBatch> {
        Ok(batch.clone())
    }
}

fn as_boolean(value: ColumnarValue, num_rows: usize) -> Result<BooleanArray> {
    let mut array = value.into_array(num_rows)?;
    if array.data_type() == &DataType::Null {
        array = cast_with_options(&array, &DataType::Boolean, &CastOptions::default())?;
    }
    array
        .as_boolean_opt()
        .cloned()
        .ok_or_else(|| Error::Type {
            message: format!("Expected boolean operand, found {}", array.data_type()),
            location: location!(),
        })
}

fn cast_columnar(
    value: ColumnarValue,
    to: &DataType,
    options: &CastOptions,
) -> Result<ColumnarValue> {
    if &value.data_type() == to {
        return Ok(value);
    }
    Ok(match value {
        ColumnarValue::Array(array) => ColumnarValue::Array(cast_with_options(&array, to, options)?),
        ColumnarValue::Scalar(scalar) => {
            let array = cast_with_options(&scalar.to_array(1), to, options)?;
            ColumnarValue::Scalar(ScalarValue::try_from_array(&array, 0)?)
        }
    })
}

fn to_datum(value: ColumnarValue) -> Result<Box<dyn Datum>> {
    Ok(match value {
        ColumnarValue::Array(array) => Box::new(array) as Box<dyn Datum>,
        ColumnarValue::Scalar(scalar) => Box::new(scalar.to_scalar()?),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::{
        array::{AsArray, BooleanArray, Int64Array, StringArray},
        compute::CastOptions,
        datatypes::DataType,
    };

    use crate::{
        expression::{
            expr_fn::{field, lit},
            values::{ColumnarValue, ScalarValue},
        },
        tests::create_record_batch_with_nulls,
    };

    use super::{Evaluator, NullEvaluator, TreeEvaluator};

    fn evaluate_bool(expr: crate::expression::expr::Expression) -> BooleanArray {
        let batch = create_record_batch_with_nulls();
        TreeEvaluator
            .evaluate(&expr, &batch)
            .unwrap()
            .into_array(batch.num_rows())
            .unwrap()
            .as_boolean()
            .clone()
    }

    #[test]
    fn test_evaluate_comparison() {
        let result = evaluate_bool(field("c2").gt(lit(1)));
        assert_eq!(result, BooleanArray::from(vec![Some(false), Some(true), None]));

        let result = evaluate_bool(lit("world").eq(field("c1")));
        assert_eq!(result, BooleanArray::from(vec![Some(false), None, Some(true)]));

        let result = evaluate_bool(field("c2").lt(field("c3")));
        assert_eq!(result, BooleanArray::from(vec![None, Some(true), None]));
    }

    #[test]
    fn test_evaluate_comparison_scalars() {
        let batch = create_record_batch_with_nulls();
        let result = TreeEvaluator
            .evaluate(&lit(1).lt(lit(2_i64)), &batch)
            .unwrap();
        assert!(matches!(
            result,
            ColumnarValue::Scalar(ScalarValue::Boolean(Some(true)))
        ));
    }

    #[test]
    fn test_evaluate_logical() {
        let result = evaluate_bool(field("c2").gt(lit(1)).and(field("c3").is_valid()));
        assert_eq!(result, BooleanArray::from(vec![Some(false), Some(true), None]));

        let result = evaluate_bool(field("c2").gt(lit(1)).or(field("c3").is_valid()));
        assert_eq!(result, BooleanArray::from(vec![Some(false), Some(true), Some(true)]));

        let result = evaluate_bool(field("c2").gt(lit(1)).not());
        assert_eq!(result, BooleanArray::from(vec![Some(true), Some(false), None]));

        let result = evaluate_bool(field("c1").is_valid().and(lit(ScalarValue::Null)));
        assert_eq!(result, BooleanArray::from(vec![None, Some(false), None]));
    }

    #[test]
    fn test_evaluate_in() {
        let set = Arc::new(Int64Array::from(vec![Some(2), None, Some(5)]));
        let result = evaluate_bool(field("c2").in_(set));
        assert_eq!(result, BooleanArray::from(vec![Some(false), Some(true), None]));

        let empty = Arc::new(Int64Array::from(Vec::<i64>::new()));
        let result = evaluate_bool(field("c2").in_(empty));
        assert_eq!(result, BooleanArray::from(vec![Some(false), Some(false), None]));

        let set = Arc::new(StringArray::from(vec!["hello"]));
        let result = evaluate_bool(field("c1").in_(set));
        assert_eq!(result, BooleanArray::from(vec![Some(true), None, Some(false)]));
    }

    #[test]
    fn test_evaluate_cast() {
        let batch = create_record_batch_with_nulls();
        let expr = field("c2").cast_to(DataType::Utf8, CastOptions::default());
        let result = TreeEvaluator
            .evaluate(&expr, &batch)
            .unwrap()
            .into_array(batch.num_rows())
            .unwrap();

        assert_eq!(
            result.as_string::<i32>(),
            &StringArray::from(vec![Some("1"), Some("2"), None])
        );
    }

    #[test]
    fn test_filter() {
        let batch = create_record_batch_with_nulls();
        let evaluator = TreeEvaluator;

        let result = evaluator
            .filter_batches(vec![batch.clone()], &field("c2").gt(lit(1)))
            .unwrap();
        assert_eq!(result[0].num_rows(), 1);

        let result = evaluator
            .filter(&ColumnarValue::Scalar(ScalarValue::Boolean(Some(true))), &batch)
            .unwrap();
        assert_eq!(result.num_rows(), 3);

        let result = evaluator
            .filter(&ColumnarValue::Scalar(ScalarValue::Boolean(None)), &batch)
            .unwrap();
        assert_eq!(result.num_rows(), 0);
        assert_eq!(result.schema(), batch.schema());

        let empty = batch.slice(0, 0);
        let result = evaluator
            .filter_batches(vec![empty], &field("c2").gt(lit(1)))
            .unwrap();
        assert_eq!(result[0].num_rows(), 0);
        assert_eq!(result[0].schema(), batch.schema());

        let result = evaluator.filter(&ColumnarValue::Scalar(ScalarValue::Int32(Some(1))), &batch);
        assert!(result.is_err());
    }

    #[test]
    fn test_evaluate_missing_field() {
        let batch = create_record_batch_with_nulls();
        assert!(TreeEvaluator.evaluate(&field("missing"), &batch).is_err());
    }

    #[test]
    fn test_null_evaluator() {
        let batch = create_record_batch_with_nulls();
        let evaluator = NullEvaluator;

        assert!(evaluator.evaluate(&field("c2").gt(lit(1)), &batch).is_err());
        let result = evaluator
            .filter(&ColumnarValue::Scalar(ScalarValue::Boolean(Some(false))), &batch)
            .unwrap();
        assert_eq!(result.num_rows(), 3);
    }
}
