use std::{
    fmt::{Debug, Display},
    sync::Arc,
};

use arrow::{
    array::{Array, ArrayRef, RecordBatch},
    compute::{can_cast_types, CastOptions},
    datatypes::{DataType, Schema},
    util::display::array_value_to_string,
};
use itertools::Itertools;
use snafu::location;

use crate::error::{Error, Result};

use super::{
    coercion::{common_type, Signature},
    operator::{CompareOperator, Operator},
    values::{ColumnarValue, ScalarValue},
};

/// A user-provided expression node evaluated outside of the built-in variants.
pub trait CustomExpression: Debug + Display + Send + Sync {
    /// The name identifying this kind of expression.
    fn name(&self) -> &str;

    /// Resolves the result type against `schema`.
    fn validate(&self, schema: &Schema) -> Result<DataType>;

    /// Evaluates the expression against `batch`.
    fn evaluate(&self, batch: &RecordBatch) -> Result<ColumnarValue>;
}

/// An immutable predicate or value expression.
///
/// Children are shared through [`Arc`], so cloning an expression is cheap and
/// sub-trees can be reused across filters and partition expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Field(FieldRef),
    Scalar(ScalarValue),
    Not(Not),
    Cast(Cast),
    And(Logical),
    Or(Logical),
    Comparison(Comparison),
    IsValid(IsValid),
    In(InList),
    Custom(Custom),
}

/// A reference to a field by name, resolved against the schema at hand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// The name of the field.
    name: String,
}

impl FieldRef {
    /// Creates a new [`FieldRef`] instance.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The name of the field.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Resolves this reference to its [`DataType`] in `schema`.
    pub fn data_type(&self, schema: &Schema) -> Result<DataType> {
        let (_, field) = schema
            .column_with_name(&self.name)
            .ok_or_else(|| Error::Type {
                message: format!(
                    "Field with name '{}' could not be found in schema",
                    &self.name
                ),
                location: location!(),
            })?;
        Ok(field.data_type().clone())
    }
}

/// Logical negation of a boolean operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Not {
    operand: Arc<Expression>,
}

impl Not {
    pub fn new(operand: Arc<Expression>) -> Self {
        Self { operand }
    }

    pub fn operand(&self) -> &Expression {
        &self.operand
    }
}

/// The type a [`Cast`] converts its operand to.
#[derive(Debug, Clone, PartialEq)]
pub enum CastTarget {
    /// An explicit [`DataType`].
    To(DataType),
    /// The result type of another expression.
    Like(Arc<Expression>),
}

/// Conversion of the operand to another type.
#[derive(Debug, Clone, PartialEq)]
pub struct Cast {
    operand: Arc<Expression>,
    target: CastTarget,
    options: CastOptions<'static>,
}

impl Cast {
    pub fn new(operand: Arc<Expression>, target: CastTarget, options: CastOptions<'static>) -> Self {
        Self {
            operand,
            target,
            options,
        }
    }

    pub fn operand(&self) -> &Expression {
        &self.operand
    }

    pub fn target(&self) -> &CastTarget {
        &self.target
    }

    pub fn options(&self) -> &CastOptions<'static> {
        &self.options
    }

    /// Resolves the target [`DataType`] against `schema`.
    pub fn to_type(&self, schema: &Schema) -> Result<DataType> {
        match &self.target {
            CastTarget::To(data_type) => Ok(data_type.clone()),
            CastTarget::Like(expr) => expr.validate(schema),
        }
    }
}

/// The operands of an `and` or `or` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Logical {
    lhs: Arc<Expression>,
    rhs: Arc<Expression>,
}

impl Logical {
    pub fn new(lhs: Arc<Expression>, rhs: Arc<Expression>) -> Self {
        Self { lhs, rhs }
    }

    pub fn lhs(&self) -> &Expression {
        &self.lhs
    }

    pub fn rhs(&self) -> &Expression {
        &self.rhs
    }
}

/// A binary comparison between two value expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// The left [`Expression`].
    lhs: Arc<Expression>,
    /// The [`CompareOperator`] for the expression.
    op: CompareOperator,
    /// The right [`Expression`].
    rhs: Arc<Expression>,
}

impl Comparison {
    /// Creates a new [`Comparison`] instance.
    pub fn new(lhs: Arc<Expression>, op: CompareOperator, rhs: Arc<Expression>) -> Self {
        Self { lhs, op, rhs }
    }

    /// A reference to the left [`Expression`].
    pub fn lhs(&self) -> &Expression {
        &self.lhs
    }

    /// The [`CompareOperator`].
    pub fn op(&self) -> CompareOperator {
        self.op
    }

    /// A reference to the right [`Expression`].
    pub fn rhs(&self) -> &Expression {
        &self.rhs
    }
}

/// Tests whether the operand is non-null.
#[derive(Debug, Clone, PartialEq)]
pub struct IsValid {
    operand: Arc<Expression>,
}

impl IsValid {
    pub fn new(operand: Arc<Expression>) -> Self {
        Self { operand }
    }

    pub fn operand(&self) -> &Expression {
        &self.operand
    }
}

/// Set membership of the operand in an array of values.
#[derive(Debug, Clone)]
pub struct InList {
    operand: Arc<Expression>,
    set: ArrayRef,
}

impl InList {
    pub fn new(operand: Arc<Expression>, set: ArrayRef) -> Self {
        Self { operand, set }
    }

    pub fn operand(&self) -> &Expression {
        &self.operand
    }

    /// The values the operand is tested against.
    pub fn set(&self) -> &ArrayRef {
        &self.set
    }
}

impl PartialEq for InList {
    fn eq(&self, other: &Self) -> bool {
        self.operand == other.operand && self.set.to_data() == other.set.to_data()
    }
}

/// Wraps a [`CustomExpression`]; two custom nodes are equal if they share an implementation.
#[derive(Debug, Clone)]
pub struct Custom(Arc<dyn CustomExpression>);

impl Custom {
    pub fn new(inner: Arc<dyn CustomExpression>) -> Self {
        Self(inner)
    }

    pub fn inner(&self) -> &Arc<dyn CustomExpression> {
        &self.0
    }
}

impl PartialEq for Custom {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Expression {
    /// Structural equality with `other`.
    pub fn equal(&self, other: &Expression) -> bool {
        self == other
    }

    /// Whether this is a scalar expression holding exactly `value`.
    pub fn equal_scalar(&self, value: &ScalarValue) -> bool {
        matches!(self, Expression::Scalar(scalar) if scalar == value)
    }

    /// Whether this is a null scalar of any type.
    pub fn is_null(&self) -> bool {
        matches!(self, Expression::Scalar(scalar) if scalar.is_null())
    }

    /// Whether this is the scalar `true`.
    pub fn is_true(&self) -> bool {
        self.equal_scalar(&ScalarValue::Boolean(Some(true)))
    }

    /// Whether this is the scalar `false`.
    pub fn is_false(&self) -> bool {
        self.equal_scalar(&ScalarValue::Boolean(Some(false)))
    }

    /// Whether the expression may still select rows.
    ///
    /// Only the literals `false` and null are known to never be satisfied.
    pub fn is_satisfiable(&self) -> bool {
        !(self.is_false() || self.is_null())
    }

    /// Resolves the result type of the expression against `schema`.
    pub fn validate(&self, schema: &Schema) -> Result<DataType> {
        use Expression::*;

        match self {
            Field(field) => field.data_type(schema),
            Scalar(value) => Ok(value.data_type()),
            Not(not) => {
                let operand = not.operand().validate(schema)?;
                ensure_boolean(&operand, self)?;
                Ok(DataType::Boolean)
            }
            Cast(cast) => {
                let from = cast.operand().validate(schema)?;
                let to = cast.to_type(schema)?;
                if !can_cast_types(&from, &to) {
                    return Err(Error::Type {
                        message: format!("Cannot cast {} from {} to {}", cast.operand(), from, to),
                        location: location!(),
                    });
                }
                Ok(to)
            }
            And(logical) | Or(logical) => {
                let op = match self {
                    And(_) => Operator::And,
                    _ => Operator::Or,
                };
                let lhs = logical.lhs().validate(schema)?;
                let rhs = logical.rhs().validate(schema)?;
                Signature::get_result_type(&lhs, &op, &rhs)
            }
            Comparison(cmp) => {
                let lhs = cmp.lhs().validate(schema)?;
                let rhs = cmp.rhs().validate(schema)?;
                Signature::get_result_type(&lhs, &Operator::Compare(cmp.op()), &rhs)
            }
            IsValid(is_valid) => {
                is_valid.operand().validate(schema)?;
                Ok(DataType::Boolean)
            }
            In(in_list) => {
                let operand = in_list.operand().validate(schema)?;
                let set = in_list.set().data_type();
                common_type(&operand, set).ok_or_else(|| Error::Type {
                    message: format!("Cannot test {} of type {} in set of {}", in_list.operand(), operand, set),
                    location: location!(),
                })?;
                Ok(DataType::Boolean)
            }
            Custom(custom) => custom.inner().validate(schema),
        }
    }

    /// Splits a conjunction into its operands, flattening nested `and` nodes.
    pub fn conjuncts(&self) -> Vec<&Expression> {
        match self {
            Expression::And(logical) => {
                let mut exprs = logical.lhs().conjuncts();
                exprs.extend(logical.rhs().conjuncts());
                exprs
            }
            other => vec![other],
        }
    }

    /// The distinct names of all fields referenced by the expression, in order of appearance.
    pub fn field_refs(&self) -> Vec<&str> {
        let mut refs = vec![];
        self.collect_field_refs(&mut refs);
        refs.into_iter().unique().collect()
    }

    fn collect_field_refs<'a>(&'a self, refs: &mut Vec<&'a str>) {
        use Expression::*;

        match self {
            Field(field) => refs.push(field.name()),
            Scalar(_) | Custom(_) => {}
            Not(not) => not.operand().collect_field_refs(refs),
            Cast(cast) => {
                cast.operand().collect_field_refs(refs);
                if let CastTarget::Like(like) = cast.target() {
                    like.collect_field_refs(refs);
                }
            }
            And(logical) | Or(logical) => {
                logical.lhs().collect_field_refs(refs);
                logical.rhs().collect_field_refs(refs);
            }
            Comparison(cmp) => {
                cmp.lhs().collect_field_refs(refs);
                cmp.rhs().collect_field_refs(refs);
            }
            IsValid(is_valid) => is_valid.operand().collect_field_refs(refs),
            In(in_list) => in_list.operand().collect_field_refs(refs),
        }
    }

    fn compare(self, op: CompareOperator, other: Expression) -> Expression {
        Expression::Comparison(Comparison::new(Arc::new(self), op, Arc::new(other)))
    }

    pub fn eq(self, other: Expression) -> Expression {
        self.compare(CompareOperator::Eq, other)
    }

    pub fn not_eq(self, other: Expression) -> Expression {
        self.compare(CompareOperator::NotEq, other)
    }

    pub fn lt(self, other: Expression) -> Expression {
        self.compare(CompareOperator::Lt, other)
    }

    pub fn lt_eq(self, other: Expression) -> Expression {
        self.compare(CompareOperator::LtEq, other)
    }

    pub fn gt(self, other: Expression) -> Expression {
        self.compare(CompareOperator::Gt, other)
    }

    pub fn gt_eq(self, other: Expression) -> Expression {
        self.compare(CompareOperator::GtEq, other)
    }

    pub fn and(self, other: Expression) -> Expression {
        Expression::And(Logical::new(Arc::new(self), Arc::new(other)))
    }

    pub fn or(self, other: Expression) -> Expression {
        Expression::Or(Logical::new(Arc::new(self), Arc::new(other)))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expression {
        Expression::Not(Not::new(Arc::new(self)))
    }

    pub fn is_valid(self) -> Expression {
        Expression::IsValid(IsValid::new(Arc::new(self)))
    }

    /// Tests membership of this expression's value in `set`.
    pub fn in_(self, set: ArrayRef) -> Expression {
        Expression::In(InList::new(Arc::new(self), set))
    }

    /// Casts this expression to `data_type`.
    pub fn cast_to(self, data_type: DataType, options: CastOptions<'static>) -> Expression {
        Expression::Cast(Cast::new(Arc::new(self), CastTarget::To(data_type), options))
    }

    /// Casts this expression to the result type of `like`.
    pub fn cast_like(self, like: Expression, options: CastOptions<'static>) -> Expression {
        Expression::Cast(Cast::new(
            Arc::new(self),
            CastTarget::Like(Arc::new(like)),
            options,
        ))
    }

    /// Conjoins `exprs` left to right; an empty input yields `true`.
    pub fn and_all(exprs: impl IntoIterator<Item = Expression>) -> Expression {
        exprs
            .into_iter()
            .reduce(Expression::and)
            .unwrap_or(Expression::Scalar(ScalarValue::Boolean(Some(true))))
    }

    /// Disjoins `exprs` left to right; an empty input yields `false`.
    pub fn or_all(exprs: impl IntoIterator<Item = Expression>) -> Expression {
        exprs
            .into_iter()
            .reduce(Expression::or)
            .unwrap_or(Expression::Scalar(ScalarValue::Boolean(Some(false))))
    }
}

fn ensure_boolean(data_type: &DataType, expr: &Expression) -> Result<()> {
    if !matches!(data_type, DataType::Boolean | DataType::Null) {
        return Err(Error::Type {
            message: format!("Expected boolean operand in {}, found {}", expr, data_type),
            location: location!(),
        });
    }
    Ok(())
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Expression::*;

        match self {
            Field(field) => write!(f, "{}", field.name()),
            Scalar(value) => write!(f, "{}", value),
            Not(not) => write!(f, "not({})", not.operand()),
            Cast(cast) => match cast.target() {
                CastTarget::To(data_type) => write!(f, "cast({}, {})", cast.operand(), data_type),
                CastTarget::Like(like) => write!(f, "cast({}, like {})", cast.operand(), like),
            },
            And(logical) => write!(f, "({} and {})", logical.lhs(), logical.rhs()),
            Or(logical) => write!(f, "({} or {})", logical.lhs(), logical.rhs()),
            Comparison(cmp) => write!(f, "({} {} {})", cmp.lhs(), cmp.op(), cmp.rhs()),
            IsValid(is_valid) => write!(f, "is_valid({})", is_valid.operand()),
            In(in_list) => {
                let set = in_list.set();
                let values = (0..set.len())
                    .map(|i| array_value_to_string(set, i))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|_| std::fmt::Error)?;
                write!(f, "{} in [{}]", in_list.operand(), values.join(", "))
            }
            Custom(custom) => write!(f, "{}", custom.inner()),
        }
    }
}
