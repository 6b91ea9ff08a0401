use std::{cmp::Ordering, fmt::Display};

/// An enumeration of comparison operators that can be applied by a
/// [`Comparison`](super::expr::Comparison) expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOperator {
    /// Returns the operator that yields the same result with swapped operands
    /// (e.g. `a < b` is `b > a`).
    pub fn flip(&self) -> Self {
        use CompareOperator::*;

        match self {
            Eq => Eq,
            NotEq => NotEq,
            Lt => Gt,
            LtEq => GtEq,
            Gt => Lt,
            GtEq => LtEq,
        }
    }

    /// Returns the operator that yields the negated result (e.g. `a < b` is `!(a >= b)`).
    pub fn negate(&self) -> Self {
        use CompareOperator::*;

        match self {
            Eq => NotEq,
            NotEq => Eq,
            Lt => GtEq,
            LtEq => Gt,
            Gt => LtEq,
            GtEq => Lt,
        }
    }

    /// Determines whether the operator only bounds values from below (e.g. `Gt`).
    pub fn is_lower_bound(&self) -> bool {
        matches!(self, CompareOperator::Gt | CompareOperator::GtEq)
    }

    /// Determines whether the operator only bounds values from above (e.g. `Lt`).
    pub fn is_upper_bound(&self) -> bool {
        matches!(self, CompareOperator::Lt | CompareOperator::LtEq)
    }

    /// Applies the operator to the result of comparing the left with the right operand.
    pub fn matches(&self, ordering: Ordering) -> bool {
        use CompareOperator::*;

        match self {
            Eq => ordering == Ordering::Equal,
            NotEq => ordering != Ordering::Equal,
            Lt => ordering == Ordering::Less,
            LtEq => ordering != Ordering::Greater,
            Gt => ordering == Ordering::Greater,
            GtEq => ordering != Ordering::Less,
        }
    }
}

/// The binary operators whose operand types are checked by
/// [`Signature`](super::coercion::Signature).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Compare(CompareOperator),
    And,
    Or,
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Compare(op) => write!(f, "{}", op),
            Operator::And => write!(f, "and"),
            Operator::Or => write!(f, "or"),
        }
    }
}

impl Display for CompareOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use CompareOperator::*;

        match self {
            Eq => write!(f, "=="),
            NotEq => write!(f, "!="),
            Lt => write!(f, "<"),
            LtEq => write!(f, "<="),
            Gt => write!(f, ">"),
            GtEq => write!(f, ">="),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::CompareOperator;

    #[test]
    fn test_compare_operator_flip_and_negate() {
        use CompareOperator::*;

        for op in [Eq, NotEq, Lt, LtEq, Gt, GtEq] {
            assert_eq!(op.flip().flip(), op);
            assert_eq!(op.negate().negate(), op);
            for ordering in [Ordering::Less, Ordering::Equal, Ordering::Greater] {
                assert_eq!(op.negate().matches(ordering), !op.matches(ordering));
                assert_eq!(op.flip().matches(ordering.reverse()), op.matches(ordering));
            }
        }
    }
}
