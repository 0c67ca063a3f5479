use thiserror::Error;

use super::table::Aggregator;
use super::value::Value;

/// Structural errors caught while building a decision-table model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The table declares no output columns.
    #[error("decision table '{table}' declares no outputs; at least one output is required")]
    NoOutputs {
        /// Name of the offending table.
        table: String,
    },

    /// A rule's input entries disagree with the declared input columns.
    #[error("rule {rule} has {found} input entries but the table declares {expected} inputs")]
    InputEntryCount {
        /// Zero-based rule index in declaration order.
        rule: usize,
        /// Number of declared inputs.
        expected: usize,
        /// Number of entries the rule carries.
        found: usize,
    },

    /// A rule's output entries disagree with the declared output columns.
    #[error("rule {rule} has {found} output entries but the table declares {expected} outputs")]
    OutputEntryCount {
        /// Zero-based rule index in declaration order.
        rule: usize,
        /// Number of declared outputs.
        expected: usize,
        /// Number of entries the rule carries.
        found: usize,
    },

    /// A multi-output table has an output without a name.
    #[error("output {index} has no name; names are required when a table declares more than one output")]
    UnnamedOutput {
        /// Zero-based output index in declaration order.
        index: usize,
    },

    /// Two outputs share the same name.
    #[error("duplicate output name '{name}'")]
    DuplicateOutputName {
        /// The duplicated output name.
        name: String,
    },

    /// An aggregator was declared without the COLLECT hit policy.
    #[error("aggregator {aggregator} requires the COLLECT hit policy")]
    AggregatorWithoutCollect {
        /// The declared aggregator.
        aggregator: Aggregator,
    },
}

/// Failures surfaced by decision-table evaluation.
///
/// The first failure in the evaluation sequence short-circuits the rest;
/// nothing is retried. A failure is a terminal outcome distinct from the
/// absent result (`Ok(None)`).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The expression engine reported an error, carried verbatim.
    #[error("expression evaluation failed: {message}")]
    Expression {
        /// The engine's message.
        message: String,
    },

    /// An input entry produced something other than a boolean.
    #[error("input entry evaluated to non-boolean value {value}")]
    InputEntryType {
        /// The offending value.
        value: Value,
    },

    /// The UNIQUE hit policy saw more than one matching rule.
    #[error("UNIQUE hit policy violated: multiple rules matched, outputs [{}]", list(outputs))]
    UniqueViolation {
        /// Shaped outputs of every matched rule, in declaration order.
        outputs: Vec<Value>,
    },

    /// The ANY hit policy saw matching rules with distinct outputs.
    #[error("ANY hit policy violated: matched rules produced distinct outputs [{}]", list(outputs))]
    AnyViolation {
        /// The distinct shaped outputs, in first-occurrence order.
        outputs: Vec<Value>,
    },

    /// COLLECT with MIN/MAX/SUM hit a multi-output rule or a non-numeric
    /// value.
    #[error("numeric aggregation failed: {detail}")]
    NumericAggregation {
        /// What made the outputs unaggregatable.
        detail: String,
    },
}

fn list(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
