use std::fmt;

use super::context::EvalContext;
use super::error::{EvalError, ModelError};
use super::value::Value;

/// How the outputs of matched rules combine into the table's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum HitPolicy {
    /// At most one rule may match; ambiguity is an error. The default.
    #[default]
    Unique,
    /// The first matching rule in declaration order wins.
    First,
    /// Multiple matches are tolerated only when their outputs are identical.
    Any,
    /// The highest-priority match wins, per the outputs' priority lists.
    Priority,
    /// All matches, in rule declaration order.
    RuleOrder,
    /// All matches, ordered by the outputs' priority lists.
    OutputOrder,
    /// All matches, optionally reduced by an [`Aggregator`].
    Collect,
}

/// The reduction applied to collected outputs under [`HitPolicy::Collect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Aggregator {
    Min,
    Max,
    Sum,
    Count,
}

/// One input column: the expression evaluated once per table evaluation to
/// produce the value every rule's corresponding entry is tested against.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Input {
    /// Textual source of the input expression, resolved through the
    /// context's parsed-expression map.
    pub expression: String,
}

/// One output column.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Output {
    /// Output name, used as the result-mapping key. Optional only when the
    /// table declares a single output.
    pub name: Option<String>,
    /// Expression evaluated as a fallback when no rule matches.
    pub default_expression: Option<String>,
    /// Ordered labels establishing preference for PRIORITY and OUTPUT_ORDER;
    /// earlier labels rank higher.
    pub priorities: Vec<String>,
}

/// One rule: input entries paired positionally with the table's inputs, and
/// output entries paired with its outputs.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rule {
    pub input_entries: Vec<String>,
    pub output_entries: Vec<String>,
}

/// A decision-table model, as produced by an external parser or by
/// [`DecisionTableBuilder`].
///
/// Fields are public so parsers can construct the model directly; the
/// builder performs the validation such a parser is expected to have done.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecisionTable {
    pub name: String,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub rules: Vec<Rule>,
    pub hit_policy: HitPolicy,
    /// Meaningful only under [`HitPolicy::Collect`].
    pub aggregator: Option<Aggregator>,
}

impl DecisionTable {
    /// Evaluate this table against the given context.
    ///
    /// Returns `Ok(None)` when no rule matches and no default output is
    /// declared; that outcome is distinct from a failure.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] on expression failures, non-boolean input
    /// entries, hit-policy violations, or invalid aggregation.
    pub fn evaluate(&self, ctx: &EvalContext) -> Result<Option<Value>, EvalError> {
        crate::evaluate::evaluate(self, ctx)
    }
}

impl fmt::Display for DecisionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DecisionTable('{}', {} inputs, {} outputs, {} rules, {})",
            self.name,
            self.inputs.len(),
            self.outputs.len(),
            self.rules.len(),
            self.hit_policy,
        )
    }
}

impl fmt::Display for HitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HitPolicy::Unique => "UNIQUE",
            HitPolicy::First => "FIRST",
            HitPolicy::Any => "ANY",
            HitPolicy::Priority => "PRIORITY",
            HitPolicy::RuleOrder => "RULE_ORDER",
            HitPolicy::OutputOrder => "OUTPUT_ORDER",
            HitPolicy::Collect => "COLLECT",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregator::Min => "MIN",
            Aggregator::Max => "MAX",
            Aggregator::Sum => "SUM",
            Aggregator::Count => "COUNT",
        };
        write!(f, "{name}")
    }
}

/// Builder for a validated [`DecisionTable`].
///
/// Outputs and rules are defined via closures over their own sub-builders.
///
/// # Example
///
/// ```
/// use dmntab::{DecisionTableBuilder, HitPolicy};
///
/// let table = DecisionTableBuilder::new("discount")
///     .hit_policy(HitPolicy::Unique)
///     .input("customer")
///     .input("orderSize")
///     .output(|o| o.name("discount").default("0.05"))
///     .rule(|r| r.when(["customer = \"Business\"", "orderSize >= 5"]).then(["0.1"]))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct DecisionTableBuilder {
    name: String,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    rules: Vec<Rule>,
    hit_policy: HitPolicy,
    aggregator: Option<Aggregator>,
}

/// Intermediate builder passed to the output definition closure.
#[derive(Debug, Default)]
pub struct OutputBuilder {
    output: Output,
}

/// Intermediate builder passed to the rule definition closure.
#[derive(Debug, Default)]
pub struct RuleBuilder {
    rule: Rule,
}

impl DecisionTableBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Declare an input column by its expression text.
    #[must_use]
    pub fn input(mut self, expression: &str) -> Self {
        self.inputs.push(Input {
            expression: expression.to_owned(),
        });
        self
    }

    /// Declare an output column.
    #[must_use]
    pub fn output(mut self, f: impl FnOnce(OutputBuilder) -> OutputBuilder) -> Self {
        let builder = OutputBuilder {
            output: Output::default(),
        };
        self.outputs.push(f(builder).output);
        self
    }

    /// Declare a rule. The closure sets input entries with `.when()` and
    /// output entries with `.then()`.
    #[must_use]
    pub fn rule(mut self, f: impl FnOnce(RuleBuilder) -> RuleBuilder) -> Self {
        self.rules.push(f(RuleBuilder::default()).rule);
        self
    }

    #[must_use]
    pub fn hit_policy(mut self, hit_policy: HitPolicy) -> Self {
        self.hit_policy = hit_policy;
        self
    }

    #[must_use]
    pub fn aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    /// Validate and produce the table.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] when the model violates a structural
    /// invariant: no outputs, entry counts that disagree with the declared
    /// columns, unnamed or duplicate-named outputs on a multi-output table,
    /// or an aggregator without COLLECT.
    pub fn build(self) -> Result<DecisionTable, ModelError> {
        if self.outputs.is_empty() {
            return Err(ModelError::NoOutputs { table: self.name });
        }
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.input_entries.len() != self.inputs.len() {
                return Err(ModelError::InputEntryCount {
                    rule: index,
                    expected: self.inputs.len(),
                    found: rule.input_entries.len(),
                });
            }
            if rule.output_entries.len() != self.outputs.len() {
                return Err(ModelError::OutputEntryCount {
                    rule: index,
                    expected: self.outputs.len(),
                    found: rule.output_entries.len(),
                });
            }
        }
        if self.outputs.len() > 1 {
            let mut seen = std::collections::HashSet::new();
            for (index, output) in self.outputs.iter().enumerate() {
                match &output.name {
                    None => return Err(ModelError::UnnamedOutput { index }),
                    Some(name) => {
                        if !seen.insert(name.as_str()) {
                            return Err(ModelError::DuplicateOutputName { name: name.clone() });
                        }
                    }
                }
            }
        }
        if let Some(aggregator) = self.aggregator
            && self.hit_policy != HitPolicy::Collect
        {
            return Err(ModelError::AggregatorWithoutCollect { aggregator });
        }
        Ok(DecisionTable {
            name: self.name,
            inputs: self.inputs,
            outputs: self.outputs,
            rules: self.rules,
            hit_policy: self.hit_policy,
            aggregator: self.aggregator,
        })
    }
}

impl OutputBuilder {
    /// Set the output name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.output.name = Some(name.to_owned());
        self
    }

    /// Set the default-output expression text.
    #[must_use]
    pub fn default(mut self, expression: &str) -> Self {
        self.output.default_expression = Some(expression.to_owned());
        self
    }

    /// Set the priority list, highest preference first.
    #[must_use]
    pub fn priorities<I>(mut self, labels: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.output.priorities = labels.into_iter().map(Into::into).collect();
        self
    }
}

impl RuleBuilder {
    /// Set the input entries, one expression text per declared input.
    #[must_use]
    pub fn when<'a>(mut self, entries: impl IntoIterator<Item = &'a str>) -> Self {
        self.rule.input_entries = entries.into_iter().map(str::to_owned).collect();
        self
    }

    /// Set the output entries, one expression text per declared output.
    #[must_use]
    pub fn then<'a>(mut self, entries: impl IntoIterator<Item = &'a str>) -> Self {
        self.rule.output_entries = entries.into_iter().map(str::to_owned).collect();
        self
    }
}
