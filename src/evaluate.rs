use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::{
    Aggregator, DecisionTable, EvalContext, EvalError, HitPolicy, Output, Rule, Value, Variables,
};

/// Evaluated outputs of one matched rule, keyed by output name.
type OutputMap = BTreeMap<String, Value>;

pub(crate) fn evaluate(
    table: &DecisionTable,
    ctx: &EvalContext,
) -> Result<Option<Value>, EvalError> {
    check_output_names(table)?;

    let input_values = evaluate_inputs(table, ctx)?;
    trace!(table = %table.name, inputs = input_values.len(), "input expressions evaluated");

    let matched = match_rules(table, &input_values, ctx)?;
    debug!(
        table = %table.name,
        matched = matched.len(),
        rules = table.rules.len(),
        "rules matched"
    );

    if matched.is_empty() {
        return default_outputs(table, ctx);
    }
    apply_hit_policy(table, &matched, ctx)
}

/// Output names are the keys of the result mapping; a multi-output table with
/// an unnamed output cannot produce one. The builder rejects such models, but
/// the model type has public fields, so the evaluator guards independently.
fn check_output_names(table: &DecisionTable) -> Result<(), EvalError> {
    if table.outputs.len() > 1 {
        for (index, output) in table.outputs.iter().enumerate() {
            if output.name.is_none() {
                return Err(EvalError::Expression {
                    message: format!(
                        "decision table '{}' declares {} outputs but output {} has no name",
                        table.name,
                        table.outputs.len(),
                        index
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Evaluate each input expression once against the caller's variables, in
/// declaration order, failing fast on the first error.
fn evaluate_inputs(table: &DecisionTable, ctx: &EvalContext) -> Result<Vec<Value>, EvalError> {
    table
        .inputs
        .iter()
        .map(|input| eval_text(ctx, &input.expression, ctx.variables()))
        .collect()
}

fn eval_text(ctx: &EvalContext, text: &str, vars: &Variables) -> Result<Value, EvalError> {
    let Some(expression) = ctx.lookup(text) else {
        return Err(EvalError::Expression {
            message: format!("no parsed expression registered for '{text}'"),
        });
    };
    expression
        .evaluate(vars)
        .map_err(|e| EvalError::Expression {
            message: e.to_string(),
        })
}

fn match_rules<'a>(
    table: &'a DecisionTable,
    input_values: &[Value],
    ctx: &EvalContext,
) -> Result<Vec<&'a Rule>, EvalError> {
    let mut matched = Vec::new();
    for rule in &table.rules {
        if rule_matches(rule, input_values, ctx)? {
            matched.push(rule);
        }
    }
    Ok(matched)
}

/// A rule matches when every input entry evaluates to `true` against its
/// paired input value. Entries are checked left to right, stopping at the
/// first `false`; a rule with no entries matches vacuously.
fn rule_matches(rule: &Rule, input_values: &[Value], ctx: &EvalContext) -> Result<bool, EvalError> {
    for (entry, input_value) in rule.input_entries.iter().zip(input_values) {
        let scoped = ctx.variables().with_input_value(input_value.clone());
        match eval_text(ctx, entry, &scoped)? {
            Value::Bool(true) => {}
            Value::Bool(false) => return Ok(false),
            other => return Err(EvalError::InputEntryType { value: other }),
        }
    }
    Ok(true)
}

/// Evaluate the output entries of each given rule against the caller's
/// variables (no input-variable injection here).
fn rule_outputs(
    table: &DecisionTable,
    rules: &[&Rule],
    ctx: &EvalContext,
) -> Result<Vec<OutputMap>, EvalError> {
    rules
        .iter()
        .map(|rule| {
            let mut map = OutputMap::new();
            for (output, entry) in table.outputs.iter().zip(&rule.output_entries) {
                let value = eval_text(ctx, entry, ctx.variables())?;
                map.insert(output_key(output), value);
            }
            Ok(map)
        })
        .collect()
}

fn output_key(output: &Output) -> String {
    output.name.clone().unwrap_or_default()
}

/// Fallback when no rule matched: evaluate each declared default-output
/// expression and shape the resulting mapping.
fn default_outputs(table: &DecisionTable, ctx: &EvalContext) -> Result<Option<Value>, EvalError> {
    let mut map = OutputMap::new();
    for output in &table.outputs {
        if let Some(text) = &output.default_expression {
            let value = eval_text(ctx, text, ctx.variables())?;
            map.insert(output_key(output), value);
        }
    }
    debug!(table = %table.name, defaults = map.len(), "no rule matched, using default outputs");
    if map.is_empty() {
        return Ok(None);
    }
    Ok(Some(collapse(map)))
}

fn apply_hit_policy(
    table: &DecisionTable,
    matched: &[&Rule],
    ctx: &EvalContext,
) -> Result<Option<Value>, EvalError> {
    // FIRST narrows before outputs are evaluated; later rules' outputs are
    // never computed.
    let narrowed: &[&Rule] = if table.hit_policy == HitPolicy::First {
        &matched[..1]
    } else {
        matched
    };
    let outputs = rule_outputs(table, narrowed, ctx)?;
    debug!(table = %table.name, policy = %table.hit_policy, "applying hit policy");

    match table.hit_policy {
        HitPolicy::Unique => {
            if outputs.len() > 1 {
                return Err(EvalError::UniqueViolation {
                    outputs: outputs.into_iter().map(collapse).collect(),
                });
            }
            Ok(single(outputs))
        }
        HitPolicy::First => Ok(single(outputs)),
        HitPolicy::Any => {
            let mut distinct: Vec<OutputMap> = Vec::new();
            for map in &outputs {
                if !distinct.contains(map) {
                    distinct.push(map.clone());
                }
            }
            if distinct.len() > 1 {
                return Err(EvalError::AnyViolation {
                    outputs: distinct.into_iter().map(collapse).collect(),
                });
            }
            Ok(single(outputs))
        }
        HitPolicy::Priority => Ok(single(priority_sorted(table, outputs))),
        HitPolicy::OutputOrder => Ok(multiple(priority_sorted(table, outputs))),
        HitPolicy::RuleOrder => Ok(multiple(outputs)),
        HitPolicy::Collect => collect(table, outputs),
    }
}

/// Take the first mapping, collapsing a single-output mapping to its bare
/// value.
fn single(outputs: Vec<OutputMap>) -> Option<Value> {
    outputs.into_iter().next().map(collapse)
}

/// Shape a list of mappings: absent for empty, collapsed for one, otherwise a
/// sequence of bare values when every mapping has exactly one key and a
/// sequence of mappings otherwise.
fn multiple(outputs: Vec<OutputMap>) -> Option<Value> {
    match outputs.len() {
        0 => None,
        1 => single(outputs),
        _ => {
            let bare = outputs.iter().all(|map| map.len() == 1);
            let items = outputs
                .into_iter()
                .map(|map| if bare { collapse(map) } else { Value::Map(map) })
                .collect();
            Some(Value::List(items))
        }
    }
}

fn collapse(mut map: OutputMap) -> Value {
    if map.len() == 1
        && let Some((_, value)) = map.pop_first()
    {
        return value;
    }
    Value::Map(map)
}

/// Sort output mappings by their priority keys, ascending; the sort is
/// stable, so equal keys keep rule declaration order.
fn priority_sorted(table: &DecisionTable, outputs: Vec<OutputMap>) -> Vec<OutputMap> {
    let mut keyed: Vec<(String, OutputMap)> = outputs
        .into_iter()
        .map(|map| (priority_key(table, &map), map))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, map)| map).collect()
}

/// The legacy priority key: for each output in declaration order, the
/// value's position in that output's priority list rendered as a decimal
/// string, or nothing when the value is unlisted. Keys compare
/// lexicographically, so unlisted values sort before listed ones and
/// positions 1 and 10 can collide with adjacent fields. Existing decision
/// models depend on these exact orderings.
fn priority_key(table: &DecisionTable, map: &OutputMap) -> String {
    let mut key = String::new();
    for output in &table.outputs {
        let position = map
            .get(output.name.as_deref().unwrap_or_default())
            .and_then(|value| {
                output
                    .priorities
                    .iter()
                    .position(|label| matches_label(value, label))
            });
        if let Some(position) = position {
            key.push_str(&position.to_string());
        }
    }
    key
}

/// Priority labels are plain strings; strings match directly, other values
/// match their canonical rendering (so the label `"22"` matches the number
/// 22).
fn matches_label(value: &Value, label: &str) -> bool {
    match value {
        Value::String(s) => s == label,
        other => other.to_string() == label,
    }
}

fn collect(table: &DecisionTable, outputs: Vec<OutputMap>) -> Result<Option<Value>, EvalError> {
    let Some(aggregator) = table.aggregator else {
        return Ok(multiple(outputs));
    };
    match aggregator {
        Aggregator::Count => {
            #[allow(clippy::cast_possible_wrap)]
            let count = outputs.len() as i64;
            Ok(Some(Value::Int(count)))
        }
        Aggregator::Min => Ok(extremum(numeric_outputs(aggregator, outputs)?, Ordering::Less)),
        Aggregator::Max => Ok(extremum(
            numeric_outputs(aggregator, outputs)?,
            Ordering::Greater,
        )),
        Aggregator::Sum => Ok(Some(sum(&numeric_outputs(aggregator, outputs)?))),
    }
}

/// MIN/MAX/SUM require every matched rule to contribute exactly one numeric
/// value.
fn numeric_outputs(
    aggregator: Aggregator,
    outputs: Vec<OutputMap>,
) -> Result<Vec<Value>, EvalError> {
    let mut values = Vec::with_capacity(outputs.len());
    for map in outputs {
        if map.len() != 1 {
            return Err(EvalError::NumericAggregation {
                detail: format!(
                    "{aggregator} requires exactly one output per rule, found {}",
                    map.len()
                ),
            });
        }
        let value = collapse(map);
        if value.as_f64().is_none() {
            return Err(EvalError::NumericAggregation {
                detail: format!("{aggregator} requires numeric outputs, found {value}"),
            });
        }
        values.push(value);
    }
    Ok(values)
}

/// The extremal value under numeric comparison, keeping the original
/// representation (an all-integer column stays integer).
fn extremum(values: Vec<Value>, prefer: Ordering) -> Option<Value> {
    let mut iter = values.into_iter();
    let mut best = iter.next()?;
    for value in iter {
        if let (Some(a), Some(b)) = (value.as_f64(), best.as_f64())
            && a.partial_cmp(&b) == Some(prefer)
        {
            best = value;
        }
    }
    Some(best)
}

fn sum(values: &[Value]) -> Value {
    if values.iter().all(|v| matches!(v, Value::Int(_))) {
        Value::Int(values.iter().filter_map(Value::as_int).sum())
    } else {
        Value::Float(values.iter().filter_map(Value::as_f64).sum())
    }
}
