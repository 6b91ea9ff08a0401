use arrow::datatypes::DataType;
use snafu::location;

use crate::error::{Error, Result};

use super::operator::Operator;

/// Represents the signature of an operation,
/// including the input and output data types.
#[derive(Debug)]
pub struct Signature {
    /// The left input's [`DataType`].
    lhs: DataType,
    /// The right input's [`DataType`].
    rhs: DataType,
    /// The return value's [`DataType`].
    ret: DataType,
}

impl Signature {
    /// Attempts to create a new [`Signature`] instance.
    fn try_new(lhs: &DataType, op: &Operator, rhs: &DataType) -> Result<Self> {
        use DataType::*;

        let coercion_err = |lhs: &DataType, op: &Operator, rhs: &DataType| -> Error {
            Error::Type {
                message: format!(
                    "Cannot infer datatype from operation {} {} {}",
                    lhs, op, rhs
                ),
                location: location!(),
            }
        };

        match op {
            Operator::Compare(_) => {
                let common = common_type(lhs, rhs).ok_or_else(|| coercion_err(lhs, op, rhs))?;
                Ok(Self {
                    lhs: common.clone(),
                    rhs: common,
                    ret: Boolean,
                })
            }
            Operator::And | Operator::Or => {
                if !matches!((lhs, rhs), (Boolean | Null, Boolean | Null)) {
                    return Err(coercion_err(lhs, op, rhs));
                }
                Ok(Self {
                    lhs: Boolean,
                    rhs: Boolean,
                    ret: Boolean,
                })
            }
        }
    }

    /// Gets the result data type of an operation given the input data types and operator.
    pub fn get_result_type(lhs: &DataType, op: &Operator, rhs: &DataType) -> Result<DataType> {
        Self::try_new(lhs, op, rhs).map(|sig| sig.ret)
    }

    /// Gets the input data type of an operation given the input data types and operator.
    pub fn get_input_types(
        lhs: &DataType,
        op: &Operator,
        rhs: &DataType,
    ) -> Result<(DataType, DataType)> {
        Self::try_new(lhs, op, rhs).map(|sig| (sig.lhs, sig.rhs))
    }
}

/// Byte width and signedness of an integer type.
fn integer_width(data_type: &DataType) -> Option<(u8, bool)> {
    use DataType::*;

    match data_type {
        Int8 => Some((1, true)),
        Int16 => Some((2, true)),
        Int32 => Some((4, true)),
        Int64 => Some((8, true)),
        UInt8 => Some((1, false)),
        UInt16 => Some((2, false)),
        UInt32 => Some((4, false)),
        UInt64 => Some((8, false)),
        _ => None,
    }
}

fn signed_of_width(width: u8) -> Option<DataType> {
    match width {
        1 => Some(DataType::Int8),
        2 => Some(DataType::Int16),
        4 => Some(DataType::Int32),
        8 => Some(DataType::Int64),
        _ => None,
    }
}

fn unsigned_of_width(width: u8) -> Option<DataType> {
    match width {
        1 => Some(DataType::UInt8),
        2 => Some(DataType::UInt16),
        4 => Some(DataType::UInt32),
        8 => Some(DataType::UInt64),
        _ => None,
    }
}

/// Returns the smallest type both `lhs` and `rhs` can be losslessly widened to.
///
/// `Null` is compatible with every type. Mixing signed and unsigned integers widens
/// to the next signed type wide enough for both, which does not exist for `UInt64`.
/// Any float widens to `Float64` unless both sides are `Float32`.
pub fn common_type(lhs: &DataType, rhs: &DataType) -> Option<DataType> {
    use DataType::*;

    if lhs == rhs {
        return Some(lhs.clone());
    }

    match (lhs, rhs) {
        (Null, other) | (other, Null) => Some(other.clone()),
        (Float32 | Float64, other) | (other, Float32 | Float64) => {
            other.is_numeric().then_some(Float64)
        }
        _ => {
            let (lw, ls) = integer_width(lhs)?;
            let (rw, rs) = integer_width(rhs)?;
            match (ls, rs) {
                (true, true) => signed_of_width(lw.max(rw)),
                (false, false) => unsigned_of_width(lw.max(rw)),
                (true, false) => signed_of_width(lw.max(rw * 2)),
                (false, true) => signed_of_width(rw.max(lw * 2)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::DataType;

    use crate::expression::operator::{CompareOperator, Operator};

    use super::{common_type, Signature};

    #[test]
    fn test_signature_coercion_err() {
        let lhs = DataType::Utf8;
        let rhs = DataType::Int64;
        let op = Operator::Compare(CompareOperator::Eq);
        let sig = Signature::try_new(&lhs, &op, &rhs);
        let input_type = Signature::get_input_types(&lhs, &op, &rhs);
        let result_type = Signature::get_result_type(&lhs, &op, &rhs);

        assert!(sig.is_err());
        assert!(input_type.is_err());
        assert!(result_type.is_err());
    }

    #[test]
    fn test_signature_bool() {
        let lhs = DataType::Boolean;
        let rhs = DataType::Null;
        let op = Operator::And;
        let input_type = Signature::get_input_types(&lhs, &op, &rhs).unwrap();
        let result_type = Signature::get_result_type(&lhs, &op, &rhs).unwrap();

        assert_eq!(input_type, (DataType::Boolean, DataType::Boolean));
        assert_eq!(result_type, DataType::Boolean);

        let result = Signature::get_result_type(&DataType::Int32, &Operator::Or, &rhs);
        assert!(result.is_err());
    }

    #[test]
    fn test_signature_cmp() {
        let lhs = DataType::Int32;
        let rhs = DataType::Int64;
        let op = Operator::Compare(CompareOperator::Lt);
        let input_type = Signature::get_input_types(&lhs, &op, &rhs).unwrap();
        let result_type = Signature::get_result_type(&lhs, &op, &rhs).unwrap();

        assert_eq!(input_type, (DataType::Int64, DataType::Int64));
        assert_eq!(result_type, DataType::Boolean);
    }

    #[test]
    fn test_common_type() {
        use DataType::*;

        let cases = [
            (Int32, Int32, Some(Int32)),
            (Int8, Int64, Some(Int64)),
            (UInt8, UInt32, Some(UInt32)),
            (UInt8, Int8, Some(Int16)),
            (Int64, UInt16, Some(Int64)),
            (UInt32, Int16, Some(Int64)),
            (UInt64, Int8, None),
            (Float32, Float32, Some(Float32)),
            (Float32, Int32, Some(Float64)),
            (Null, Utf8, Some(Utf8)),
            (Utf8, Int32, None),
            (Boolean, Float64, None),
        ];

        for (lhs, rhs, expected) in cases {
            assert_eq!(common_type(&lhs, &rhs), expected, "{} vs {}", lhs, rhs);
            assert_eq!(common_type(&rhs, &lhs), expected, "{} vs {}", rhs, lhs);
        }
    }
}
