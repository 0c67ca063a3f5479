mod context;
mod error;
mod expr;
mod table;
mod value;

pub use context::{EvalContext, INPUT_VALUE_NAME, Variables};
pub use error::{EvalError, ModelError};
pub use expr::{
    CompareOp, Expr, Expression, ExpressionError, ParsedExpression, input_value, lit, var,
};
pub use table::{
    Aggregator, DecisionTable, DecisionTableBuilder, HitPolicy, Input, Output, OutputBuilder,
    Rule, RuleBuilder,
};
pub use value::Value;
