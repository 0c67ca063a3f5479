use std::collections::HashMap;
use std::sync::Arc;

use super::expr::{Expression, ParsedExpression};
use super::value::Value;

/// The reserved name bound to the current input's value while an input entry
/// is evaluated. Conventionally `?` in DMN unary tests.
pub const INPUT_VALUE_NAME: &str = "?";

/// Variable binding mapping dot-separated paths to [`Value`]s.
///
/// Supports nested paths like `"customer.tier"`. The binding is read-only
/// during evaluation; the input-variable augmentation works on a copy.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    data: HashMap<String, Node>,
}

#[derive(Debug, Clone)]
enum Node {
    Value(Value),
    Branch(HashMap<String, Node>),
}

impl Variables {
    /// Create an empty binding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value at a dot-separated path. Creates intermediate branches as
    /// needed.
    #[must_use]
    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.insert(path, value.into());
        self
    }

    /// Insert a value at a dot-separated path (mutable reference version).
    pub fn insert(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').collect();
        Self::insert_at(&mut self.data, &segments, value);
    }

    /// Look up a value by dot-separated path.
    /// Returns `None` if the path does not exist or stops at a branch.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let segments: Vec<&str> = path.split('.').collect();
        Self::get_at(&self.data, &segments)
    }

    /// A copy of this binding with the reserved input variable bound to
    /// `value`. The receiver is untouched, so a caller variable named `?`
    /// is shadowed only for the lifetime of the copy.
    #[must_use]
    pub fn with_input_value(&self, value: Value) -> Variables {
        let mut scoped = self.clone();
        scoped.insert(INPUT_VALUE_NAME, value);
        scoped
    }

    fn insert_at(map: &mut HashMap<String, Node>, segments: &[&str], value: Value) {
        match segments {
            [] => {}
            [last] => {
                map.insert((*last).to_owned(), Node::Value(value));
            }
            [first, rest @ ..] => {
                let entry = map
                    .entry((*first).to_owned())
                    .or_insert_with(|| Node::Branch(HashMap::new()));
                match entry {
                    Node::Branch(branch) => Self::insert_at(branch, rest, value),
                    Node::Value(_) => {
                        let mut branch = HashMap::new();
                        Self::insert_at(&mut branch, rest, value);
                        *entry = Node::Branch(branch);
                    }
                }
            }
        }
    }

    fn get_at<'a>(map: &'a HashMap<String, Node>, segments: &[&str]) -> Option<&'a Value> {
        match segments {
            [] => None,
            [last] => match map.get(*last)? {
                Node::Value(v) => Some(v),
                Node::Branch(_) => None,
            },
            [first, rest @ ..] => match map.get(*first)? {
                Node::Branch(branch) => Self::get_at(branch, rest),
                Node::Value(_) => None,
            },
        }
    }
}

/// Everything a table evaluation reads: the caller's variables and the map
/// from textual expression source to its pre-parsed handle.
///
/// The context is shared unchanged across all expression evaluations inside a
/// single call; only input-entry evaluation sees an augmented copy of the
/// variables.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    variables: Variables,
    expressions: HashMap<String, ParsedExpression>,
}

impl EvalContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context over an existing variable binding.
    #[must_use]
    pub fn with_variables(variables: Variables) -> Self {
        Self {
            variables,
            expressions: HashMap::new(),
        }
    }

    /// Bind a variable at a dot-separated path.
    #[must_use]
    pub fn variable(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(path, value.into());
        self
    }

    /// Register the parsed form of an expression text.
    #[must_use]
    pub fn expression(mut self, text: &str, expression: impl Expression + 'static) -> Self {
        self.expressions.insert(text.to_owned(), Arc::new(expression));
        self
    }

    /// Register an already-shared parsed expression handle.
    #[must_use]
    pub fn parsed_expression(mut self, text: &str, expression: ParsedExpression) -> Self {
        self.expressions.insert(text.to_owned(), expression);
        self
    }

    /// The caller's variable binding.
    #[must_use]
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub(crate) fn lookup(&self, text: &str) -> Option<&ParsedExpression> {
        self.expressions.get(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::expr::{lit, var};

    #[test]
    fn set_and_get_simple() {
        let vars = Variables::new().set("customer", "Business");
        assert_eq!(
            vars.get("customer"),
            Some(&Value::String("Business".to_owned()))
        );
    }

    #[test]
    fn set_and_get_nested() {
        let vars = Variables::new().set("customer.tier", "gold");
        assert_eq!(
            vars.get("customer.tier"),
            Some(&Value::String("gold".to_owned()))
        );
        assert_eq!(vars.get("customer"), None);
    }

    #[test]
    fn get_missing_returns_none() {
        let vars = Variables::new().set("orderSize", 7_i64);
        assert_eq!(vars.get("order"), None);
        assert_eq!(vars.get("orderSize.sub"), None);
    }

    #[test]
    fn overwrite_value() {
        let vars = Variables::new().set("x", 1_i64).set("x", 2_i64);
        assert_eq!(vars.get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn overwrite_value_with_branch() {
        let vars = Variables::new().set("a", 1_i64).set("a.b", 2_i64);
        assert_eq!(vars.get("a.b"), Some(&Value::Int(2)));
        assert_eq!(vars.get("a"), None);
    }

    #[test]
    fn input_value_overlay_is_scoped() {
        let vars = Variables::new().set("orderSize", 7_i64);
        let scoped = vars.with_input_value(Value::Int(7));

        assert_eq!(scoped.get(INPUT_VALUE_NAME), Some(&Value::Int(7)));
        assert_eq!(scoped.get("orderSize"), Some(&Value::Int(7)));
        // The original binding never sees the reserved name.
        assert_eq!(vars.get(INPUT_VALUE_NAME), None);
    }

    #[test]
    fn input_value_overlay_shadows_caller_binding() {
        let vars = Variables::new().set(INPUT_VALUE_NAME, "caller-owned");
        let scoped = vars.with_input_value(Value::Int(3));

        assert_eq!(scoped.get(INPUT_VALUE_NAME), Some(&Value::Int(3)));
        assert_eq!(
            vars.get(INPUT_VALUE_NAME),
            Some(&Value::String("caller-owned".to_owned()))
        );
    }

    #[test]
    fn context_registers_and_looks_up_expressions() {
        let ctx = EvalContext::new()
            .variable("orderSize", 7_i64)
            .expression("orderSize", var("orderSize"))
            .expression("0.1", lit(0.1));

        assert!(ctx.lookup("orderSize").is_some());
        assert!(ctx.lookup("0.1").is_some());
        assert!(ctx.lookup("unregistered").is_none());
    }

    #[test]
    fn context_over_existing_variables() {
        let vars = Variables::new().set("age", 58_i64);
        let ctx = EvalContext::with_variables(vars);
        assert_eq!(ctx.variables().get("age"), Some(&Value::Int(58)));
    }
}
