use std::{cmp::Ordering, sync::Arc};

use arrow::array::Array;

use super::{
    expr::{Cast, CastTarget, Comparison, Expression},
    operator::CompareOperator,
    values::ScalarValue,
};

impl Expression {
    /// Simplifies the expression under the assumption that `given` holds.
    ///
    /// The conjuncts of `given` are treated as facts. Sub-expressions decided by the facts
    /// fold into boolean literals (null when the outcome is null under three-valued logic);
    /// everything else is kept as is. The result is equivalent to `self` for every row on
    /// which `given` is true.
    pub fn assume(&self, given: &Expression) -> Expression {
        let facts = given.conjuncts();
        simplify(self, &facts)
    }
}

fn bool_lit(value: Option<bool>) -> Expression {
    Expression::Scalar(ScalarValue::Boolean(value))
}

/// The boolean value of a literal, with `Some(None)` for a null of any type.
fn as_bool(expr: &Expression) -> Option<Option<bool>> {
    match expr {
        Expression::Scalar(ScalarValue::Boolean(value)) => Some(*value),
        Expression::Scalar(value) if value.is_null() => Some(None),
        _ => None,
    }
}

/// Matches `field op scalar` in either operand order, normalized to the field on the left.
///
/// A negated comparison matches with the negated operator.
fn as_field_comparison(expr: &Expression) -> Option<(&str, CompareOperator, &ScalarValue)> {
    let cmp = match expr {
        Expression::Comparison(cmp) => cmp,
        Expression::Not(not) => {
            return as_field_comparison(not.operand())
                .filter(|_| matches!(not.operand(), Expression::Comparison(_)))
                .map(|(field, op, value)| (field, op.negate(), value));
        }
        _ => return None,
    };
    match (cmp.lhs(), cmp.rhs()) {
        (Expression::Field(field), Expression::Scalar(value)) => {
            Some((field.name(), cmp.op(), value))
        }
        (Expression::Scalar(value), Expression::Field(field)) => {
            Some((field.name(), cmp.op().flip(), value))
        }
        _ => None,
    }
}

/// The value a field is pinned to by the facts, null if a fact says it is not valid.
fn fixed_value(name: &str, facts: &[&Expression]) -> Option<ScalarValue> {
    facts.iter().find_map(|fact| match fact {
        Expression::Not(not) => match not.operand() {
            Expression::IsValid(is_valid) => match is_valid.operand() {
                Expression::Field(field) if field.name() == name => Some(ScalarValue::Null),
                _ => None,
            },
            _ => None,
        },
        _ => match as_field_comparison(fact) {
            Some((field, CompareOperator::Eq, value)) if field == name && !value.is_null() => {
                Some(value.clone())
            }
            _ => None,
        },
    })
}

/// Decides `x op value` knowing that `x fact_op fact_value` holds.
fn implied(
    op: CompareOperator,
    value: &ScalarValue,
    fact_op: CompareOperator,
    fact_value: &ScalarValue,
) -> Option<bool> {
    use CompareOperator::*;

    let ord = fact_value.compare(value)?;
    match fact_op {
        Eq => Some(op.matches(ord)),
        NotEq => match (op, ord) {
            (Eq, Ordering::Equal) => Some(false),
            (NotEq, Ordering::Equal) => Some(true),
            _ => None,
        },
        Lt | LtEq | Gt | GtEq => {
            let strict = matches!(fact_op, Lt | Gt);
            let beyond = if fact_op.is_upper_bound() {
                ord == Ordering::Less
            } else {
                ord == Ordering::Greater
            };
            match op {
                Eq | NotEq => {
                    let inside = fact_op.matches(ord.reverse());
                    (!inside).then_some(op == NotEq)
                }
                _ if fact_op.is_lower_bound() == op.is_lower_bound() => {
                    let subset = beyond || (ord == Ordering::Equal && (strict || matches!(op, LtEq | GtEq)));
                    subset.then_some(true)
                }
                _ => {
                    let disjoint = beyond || (ord == Ordering::Equal && (strict || matches!(op, Lt | Gt)));
                    disjoint.then_some(false)
                }
            }
        }
    }
}

fn simplify(expr: &Expression, facts: &[&Expression]) -> Expression {
    use Expression::*;

    if !matches!(expr, Scalar(_)) {
        if facts.iter().any(|fact| *fact == expr) {
            return bool_lit(Some(true));
        }
        let negated = facts
            .iter()
            .any(|fact| matches!(fact, Not(not) if not.operand() == expr));
        if negated {
            return bool_lit(Some(false));
        }
    }

    match expr {
        Field(field) => fixed_value(field.name(), facts)
            .map(Scalar)
            .unwrap_or_else(|| expr.clone()),
        Scalar(_) | Custom(_) => expr.clone(),
        Not(not) => {
            let operand = simplify(not.operand(), facts);
            match as_bool(&operand) {
                Some(value) => bool_lit(value.map(|v| !v)),
                None => operand.not(),
            }
        }
        And(logical) => {
            let lhs = simplify(logical.lhs(), facts);
            let rhs = simplify(logical.rhs(), facts);
            match (as_bool(&lhs), as_bool(&rhs)) {
                (Some(Some(false)), _) | (_, Some(Some(false))) => bool_lit(Some(false)),
                (Some(Some(true)), _) => rhs,
                (_, Some(Some(true))) => lhs,
                (Some(None), Some(None)) => bool_lit(None),
                _ => lhs.and(rhs),
            }
        }
        Or(logical) => {
            let lhs = simplify(logical.lhs(), facts);
            let rhs = simplify(logical.rhs(), facts);
            match (as_bool(&lhs), as_bool(&rhs)) {
                (Some(Some(true)), _) | (_, Some(Some(true))) => bool_lit(Some(true)),
                (Some(Some(false)), _) => rhs,
                (_, Some(Some(false))) => lhs,
                (Some(None), Some(None)) => bool_lit(None),
                _ => lhs.or(rhs),
            }
        }
        Comparison(cmp) => simplify_comparison(cmp, facts),
        IsValid(is_valid) => match simplify(is_valid.operand(), facts) {
            Scalar(value) => bool_lit(Some(!value.is_null())),
            operand => operand.is_valid(),
        },
        Cast(cast) => {
            let operand = simplify(cast.operand(), facts);
            if let (Scalar(value), CastTarget::To(data_type)) = (&operand, cast.target()) {
                if let Ok(value) = value.cast_to(data_type) {
                    return Scalar(value);
                }
            }
            Cast(self::Cast::new(
                Arc::new(operand),
                cast.target().clone(),
                cast.options().clone(),
            ))
        }
        In(in_list) => match simplify(in_list.operand(), facts) {
            Scalar(value) if value.is_null() => bool_lit(None),
            Scalar(value) => {
                let set = in_list.set();
                let found = (0..set.len()).filter(|i| set.is_valid(*i)).any(|i| {
                    ScalarValue::try_from_array(set, i)
                        .ok()
                        .and_then(|element| value.compare(&element))
                        == Some(Ordering::Equal)
                });
                bool_lit(Some(found))
            }
            operand => operand.in_(in_list.set().clone()),
        },
    }
}

fn simplify_comparison(cmp: &Comparison, facts: &[&Expression]) -> Expression {
    let lhs = simplify(cmp.lhs(), facts);
    let rhs = simplify(cmp.rhs(), facts);

    if lhs.is_null() || rhs.is_null() {
        return bool_lit(None);
    }
    if let (Expression::Scalar(l), Expression::Scalar(r)) = (&lhs, &rhs) {
        if let Some(ord) = l.compare(r) {
            return bool_lit(Some(cmp.op().matches(ord)));
        }
    }

    let normalized = match (&lhs, &rhs) {
        (Expression::Field(field), Expression::Scalar(value)) => {
            Some((field.name(), cmp.op(), value))
        }
        (Expression::Scalar(value), Expression::Field(field)) => {
            Some((field.name(), cmp.op().flip(), value))
        }
        _ => None,
    };
    if let Some((name, op, value)) = normalized {
        let decided = facts.iter().find_map(|fact| match as_field_comparison(fact) {
            Some((field, fact_op, fact_value)) if field == name && !fact_value.is_null() => {
                implied(op, value, fact_op, fact_value)
            }
            _ => None,
        });
        if let Some(result) = decided {
            return bool_lit(Some(result));
        }
    }

    Expression::Comparison(Comparison::new(Arc::new(lhs), cmp.op(), Arc::new(rhs)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::Int32Array;

    use crate::expression::expr_fn::{field, lit};

    #[test]
    fn test_assume_equality_facts() {
        let filter = field("year").eq(lit(2020)).and(field("month").eq(lit(7)));

        let result = filter.assume(&field("year").eq(lit(2020)));
        assert_eq!(result, field("month").eq(lit(7)));

        let result = filter.assume(&field("year").eq(lit(2021)));
        assert!(result.is_false());

        let given = field("year").eq(lit(2020)).and(field("month").eq(lit(7)));
        assert!(filter.assume(&given).is_true());
    }

    #[test]
    fn test_assume_range_facts() {
        let given = field("x").lt(lit(5));
        assert!(field("x").gt(lit(7)).assume(&given).is_false());
        assert!(field("x").gt_eq(lit(5)).assume(&given).is_false());
        assert!(field("x").lt_eq(lit(5)).assume(&given).is_true());
        assert!(field("x").eq(lit(9)).assume(&given).is_false());
        assert!(lit(9).not_eq(field("x")).assume(&given).is_true());

        let given = field("x").lt_eq(lit(5));
        assert_eq!(
            field("x").gt_eq(lit(5)).assume(&given),
            field("x").gt_eq(lit(5))
        );
        assert!(lit(5_i64).lt(field("x")).assume(&given).is_false());
    }

    #[test]
    fn test_assume_negated_facts() {
        let given = field("x").lt(lit(5)).not();
        assert!(field("x").lt(lit(3)).assume(&given).is_false());
        assert!(field("x").gt_eq(lit(5)).assume(&given).is_true());
        assert_eq!(field("x").gt(lit(5)).assume(&given), field("x").gt(lit(5)));

        let given = field("year").not_eq(lit(2020)).not();
        assert!(field("year").eq(lit(2020)).assume(&given).is_true());
        assert!(field("year").eq(lit(2021)).assume(&given).is_false());
    }

    #[test]
    fn test_assume_validity_facts() {
        let given = field("year").eq(lit(2020));
        assert!(field("year").is_valid().assume(&given).is_true());

        let given = field("year").is_valid().not();
        let result = field("year").eq(lit(2020)).assume(&given);
        assert!(!result.is_satisfiable());
        assert!(field("year").is_valid().assume(&given).is_false());
    }

    #[test]
    fn test_assume_folds_literals() {
        let no_facts = lit(true);
        assert!(lit(1).lt(lit(2)).assume(&no_facts).is_true());
        assert!(lit(1).lt(lit(2)).not().assume(&no_facts).is_false());

        let set = Arc::new(Int32Array::from(vec![1, 2]));
        assert!(lit(2).in_(set.clone()).assume(&no_facts).is_true());
        assert!(lit(3).in_(set).assume(&no_facts).is_false());

        let filter = field("a").eq(lit(1)).or(field("b").eq(lit(2)));
        assert_eq!(filter.assume(&no_facts), filter);
    }
}
