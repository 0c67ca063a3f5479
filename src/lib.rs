mod evaluate;
mod types;

pub use types::{
    Aggregator, CompareOp, DecisionTable, DecisionTableBuilder, EvalContext, EvalError, Expr,
    Expression, ExpressionError, HitPolicy, INPUT_VALUE_NAME, Input, ModelError, Output,
    OutputBuilder, ParsedExpression, Rule, RuleBuilder, Value, Variables, input_value, lit, var,
};
