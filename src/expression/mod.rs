pub mod assume;
pub mod coercion;
pub mod evaluator;
pub mod expr;
pub mod expr_fn;
pub mod operator;
pub mod values;
