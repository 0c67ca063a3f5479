use std::fmt;
use std::ops::Not;
use std::sync::Arc;

use thiserror::Error;

use super::context::{INPUT_VALUE_NAME, Variables};
use super::value::Value;

/// Comparison operators understood by the built-in expression implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Failure reported by an expression implementation.
///
/// The evaluator wraps the message verbatim into its expression-failure kind;
/// it never inspects the contents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExpressionError {
    message: String,
}

impl ExpressionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Contract between the decision-table evaluator and the expression engine.
///
/// Implementations evaluate a previously-parsed expression against a variable
/// binding. They must be deterministic with respect to their inputs; the
/// evaluator calls them sequentially from the caller's thread.
pub trait Expression: fmt::Debug + Send + Sync {
    /// Evaluate against the given variables, producing a value or a failure.
    fn evaluate(&self, vars: &Variables) -> Result<Value, ExpressionError>;
}

/// Opaque handle to a pre-parsed expression, shareable across evaluations.
pub type ParsedExpression = Arc<dyn Expression>;

/// Built-in expression AST: literals, variable references, comparisons, and
/// boolean connectives. Enough to express unary tests like `? >= 5` and
/// output entries like `0.1` without an external engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    Compare {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expression for Expr {
    fn evaluate(&self, vars: &Variables) -> Result<Value, ExpressionError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(path) => vars
                .get(path)
                .cloned()
                .ok_or_else(|| ExpressionError::new(format!("unknown variable '{path}'"))),
            Expr::Compare { left, op, right } => {
                let l = left.evaluate(vars)?;
                let r = right.evaluate(vars)?;
                l.compare(*op, &r).map(Value::Bool).ok_or_else(|| {
                    ExpressionError::new(format!("cannot compare {l} {op} {r}"))
                })
            }
            Expr::And(a, b) => {
                if !boolean(a.evaluate(vars)?)? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(boolean(b.evaluate(vars)?)?))
            }
            Expr::Or(a, b) => {
                if boolean(a.evaluate(vars)?)? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(boolean(b.evaluate(vars)?)?))
            }
            Expr::Not(inner) => Ok(Value::Bool(!boolean(inner.evaluate(vars)?)?)),
        }
    }
}

fn boolean(value: Value) -> Result<bool, ExpressionError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(ExpressionError::new(format!(
            "expected a boolean operand, got {other}"
        ))),
    }
}

impl Expr {
    #[must_use]
    pub fn eq(self, other: impl Into<Expr>) -> Expr {
        self.cmp_with(CompareOp::Eq, other)
    }

    #[must_use]
    pub fn neq(self, other: impl Into<Expr>) -> Expr {
        self.cmp_with(CompareOp::Neq, other)
    }

    #[must_use]
    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        self.cmp_with(CompareOp::Gt, other)
    }

    #[must_use]
    pub fn gte(self, other: impl Into<Expr>) -> Expr {
        self.cmp_with(CompareOp::Gte, other)
    }

    #[must_use]
    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        self.cmp_with(CompareOp::Lt, other)
    }

    #[must_use]
    pub fn lte(self, other: impl Into<Expr>) -> Expr {
        self.cmp_with(CompareOp::Lte, other)
    }

    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    fn cmp_with(self, op: CompareOp, other: impl Into<Expr>) -> Expr {
        Expr::Compare {
            left: Box::new(self),
            op,
            right: Box::new(other.into()),
        }
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

/// A literal value expression.
#[must_use]
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

/// A variable reference. Supports dot-separated paths like `"customer.tier"`.
#[must_use]
pub fn var(path: &str) -> Expr {
    Expr::Variable(path.to_owned())
}

/// A reference to the reserved input variable `?`, bound during input-entry
/// evaluation to the current input's value.
#[must_use]
pub fn input_value() -> Expr {
    Expr::Variable(INPUT_VALUE_NAME.to_owned())
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        lit(v)
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        lit(v)
    }
}

impl From<bool> for Expr {
    fn from(v: bool) -> Self {
        lit(v)
    }
}

impl From<&str> for Expr {
    fn from(v: &str) -> Self {
        lit(v)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Neq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::Variable(path) => write!(f, "{path}"),
            Expr::Compare { left, op, right } => write!(f, "({left} {op} {right})"),
            Expr::And(a, b) => write!(f, "({a} AND {b})"),
            Expr::Or(a, b) => write!(f, "({a} OR {b})"),
            Expr::Not(inner) => write!(f, "(NOT {inner})"),
        }
    }
}
