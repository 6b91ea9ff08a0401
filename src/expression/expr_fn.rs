use super::{
    expr::{Expression, FieldRef},
    values::ScalarValue,
};

/// Creates an [`Expression::Field`] with provided `name`.
pub fn field(name: impl Into<String>) -> Expression {
    Expression::Field(FieldRef::new(name))
}

/// Creates an [`Expression::Scalar`].
pub fn lit<T: LiteralExt>(value: T) -> Expression {
    value.lit()
}

/// An extension trait for returning [`Expression::Scalar`].
pub trait LiteralExt {
    fn lit(&self) -> Expression;
}

macro_rules! make_lit {
    ($ty:ident, $scalar:ident) => {
        impl LiteralExt for $ty {
            fn lit(&self) -> Expression {
                Expression::Scalar(ScalarValue::$scalar(Some(*self)))
            }
        }
    };
}

make_lit!(bool, Boolean);
make_lit!(i8, Int8);
make_lit!(i16, Int16);
make_lit!(i32, Int32);
make_lit!(i64, Int64);
make_lit!(u8, UInt8);
make_lit!(u16, UInt16);
make_lit!(u32, UInt32);
make_lit!(u64, UInt64);
make_lit!(f32, Float32);
make_lit!(f64, Float64);

impl LiteralExt for String {
    fn lit(&self) -> Expression {
        Expression::Scalar(ScalarValue::Utf8(Some(self.clone())))
    }
}

impl LiteralExt for &String {
    fn lit(&self) -> Expression {
        Expression::Scalar(ScalarValue::Utf8(Some(self.to_string())))
    }
}

impl LiteralExt for &str {
    fn lit(&self) -> Expression {
        Expression::Scalar(ScalarValue::Utf8(Some(self.to_string())))
    }
}

impl LiteralExt for ScalarValue {
    fn lit(&self) -> Expression {
        Expression::Scalar(self.clone())
    }
}
