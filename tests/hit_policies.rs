use std::collections::BTreeMap;

use dmntab::{
    Aggregator, DecisionTableBuilder, EvalContext, EvalError, HitPolicy, Value, input_value, lit,
    var,
};

/// Single-input, single-output table over `score` where every listed rule
/// matches `score = 50`.
fn scored_table(policy: HitPolicy, grants: &[&str]) -> dmntab::DecisionTable {
    let mut builder = DecisionTableBuilder::new("grants")
        .hit_policy(policy)
        .input("score")
        .output(|o| o.name("grant"));
    for grant in grants {
        builder = builder.rule(|r| r.when(["-"]).then([*grant]));
    }
    builder.build().unwrap()
}

fn scored_context() -> EvalContext {
    EvalContext::new()
        .variable("score", 50_i64)
        .expression("score", var("score"))
        .expression("-", lit(true))
        .expression("10", lit(10_i64))
        .expression("20", lit(20_i64))
        .expression("30", lit(30_i64))
        .expression("2.5", lit(2.5))
        .expression("\"a\"", lit("a"))
        .expression("\"b\"", lit("b"))
}

#[test]
fn unique_single_match_succeeds() {
    let table = scored_table(HitPolicy::Unique, &["10"]);
    assert_eq!(
        table.evaluate(&scored_context()),
        Ok(Some(Value::Int(10)))
    );
}

#[test]
fn unique_rejects_multiple_matches_listing_outputs() {
    let table = scored_table(HitPolicy::Unique, &["10", "20"]);
    let err = table.evaluate(&scored_context()).unwrap_err();
    assert_eq!(
        err,
        EvalError::UniqueViolation {
            outputs: vec![Value::Int(10), Value::Int(20)],
        }
    );
    assert_eq!(
        err.to_string(),
        "UNIQUE hit policy violated: multiple rules matched, outputs [10, 20]"
    );
}

#[test]
fn first_takes_the_lowest_indexed_match() {
    let table = scored_table(HitPolicy::First, &["10", "20", "30"]);
    assert_eq!(
        table.evaluate(&scored_context()),
        Ok(Some(Value::Int(10)))
    );
}

#[test]
fn first_narrows_before_output_evaluation() {
    // The second rule's output entry is never registered; FIRST must not
    // evaluate it.
    let table = DecisionTableBuilder::new("t")
        .hit_policy(HitPolicy::First)
        .input("score")
        .output(|o| o.name("grant"))
        .rule(|r| r.when(["-"]).then(["10"]))
        .rule(|r| r.when(["-"]).then(["unregistered"]))
        .build()
        .unwrap();
    assert_eq!(
        table.evaluate(&scored_context()),
        Ok(Some(Value::Int(10)))
    );
}

#[test]
fn any_tolerates_identical_multi_output_mappings() {
    let table = DecisionTableBuilder::new("t")
        .hit_policy(HitPolicy::Any)
        .input("score")
        .output(|o| o.name("grant"))
        .output(|o| o.name("label"))
        .rule(|r| r.when(["-"]).then(["10", "\"a\""]))
        .rule(|r| r.when(["-"]).then(["10", "\"a\""]))
        .build()
        .unwrap();
    let expected = Value::Map(BTreeMap::from([
        ("grant".to_owned(), Value::Int(10)),
        ("label".to_owned(), Value::String("a".into())),
    ]));
    assert_eq!(table.evaluate(&scored_context()), Ok(Some(expected)));
}

#[test]
fn any_rejects_mappings_differing_in_one_key() {
    let table = DecisionTableBuilder::new("t")
        .hit_policy(HitPolicy::Any)
        .input("score")
        .output(|o| o.name("grant"))
        .output(|o| o.name("label"))
        .rule(|r| r.when(["-"]).then(["10", "\"a\""]))
        .rule(|r| r.when(["-"]).then(["10", "\"b\""]))
        .build()
        .unwrap();
    assert!(matches!(
        table.evaluate(&scored_context()),
        Err(EvalError::AnyViolation { outputs }) if outputs.len() == 2
    ));
}

#[test]
fn priority_listed_order_beats_declaration_order() {
    let table = DecisionTableBuilder::new("t")
        .hit_policy(HitPolicy::Priority)
        .input("score")
        .output(|o| o.name("grant").priorities(["30", "10", "20"]))
        .rule(|r| r.when(["-"]).then(["10"]))
        .rule(|r| r.when(["-"]).then(["30"]))
        .build()
        .unwrap();
    // 30 is listed before 10, so the second rule wins.
    assert_eq!(
        table.evaluate(&scored_context()),
        Ok(Some(Value::Int(30)))
    );
}

#[test]
fn priority_unlisted_values_sort_before_listed_ones() {
    // The empty key of an unlisted value lexicographically precedes every
    // digit, so the unlisted output wins. Legacy behavior, relied upon by
    // existing models.
    let table = DecisionTableBuilder::new("t")
        .hit_policy(HitPolicy::Priority)
        .input("score")
        .output(|o| o.name("grant").priorities(["10", "20"]))
        .rule(|r| r.when(["-"]).then(["10"]))
        .rule(|r| r.when(["-"]).then(["30"]))
        .build()
        .unwrap();
    assert_eq!(
        table.evaluate(&scored_context()),
        Ok(Some(Value::Int(30)))
    );
}

#[test]
fn priority_multi_digit_positions_can_collide_across_outputs() {
    // Key of rule A: position 1 then 0 -> "10". Key of rule B: position 10
    // then nothing -> "10". Equal keys tie, and the stable sort keeps
    // declaration order, so B (declared first) wins.
    let labels: Vec<String> = (0..=10).map(|i| format!("p{i}")).collect();
    let table = DecisionTableBuilder::new("t")
        .hit_policy(HitPolicy::Priority)
        .input("score")
        .output(|o| o.name("x").priorities(labels.iter().map(String::as_str)))
        .output(|o| o.name("y").priorities(["q0", "q1"]))
        .rule(|r| r.when(["-"]).then(["\"p10\"", "\"zzz\""]))
        .rule(|r| r.when(["-"]).then(["\"p1\"", "\"q0\""]))
        .build()
        .unwrap();
    let ctx = scored_context()
        .expression("\"p10\"", lit("p10"))
        .expression("\"p1\"", lit("p1"))
        .expression("\"q0\"", lit("q0"))
        .expression("\"zzz\"", lit("zzz"));

    let expected = Value::Map(BTreeMap::from([
        ("x".to_owned(), Value::String("p10".into())),
        ("y".to_owned(), Value::String("zzz".into())),
    ]));
    assert_eq!(table.evaluate(&ctx), Ok(Some(expected)));
}

#[test]
fn output_order_sorts_and_keeps_all_matches() {
    let table = DecisionTableBuilder::new("t")
        .hit_policy(HitPolicy::OutputOrder)
        .input("score")
        .output(|o| o.name("grant").priorities(["30", "20", "10"]))
        .rule(|r| r.when(["-"]).then(["10"]))
        .rule(|r| r.when(["-"]).then(["30"]))
        .rule(|r| r.when(["-"]).then(["20"]))
        .build()
        .unwrap();
    assert_eq!(
        table.evaluate(&scored_context()),
        Ok(Some(Value::List(vec![
            Value::Int(30),
            Value::Int(20),
            Value::Int(10),
        ])))
    );
}

#[test]
fn rule_order_preserves_declaration_order() {
    let table = scored_table(HitPolicy::RuleOrder, &["30", "10", "20"]);
    assert_eq!(
        table.evaluate(&scored_context()),
        Ok(Some(Value::List(vec![
            Value::Int(30),
            Value::Int(10),
            Value::Int(20),
        ])))
    );
}

#[test]
fn rule_order_with_single_match_collapses_to_bare_value() {
    let table = scored_table(HitPolicy::RuleOrder, &["10"]);
    assert_eq!(
        table.evaluate(&scored_context()),
        Ok(Some(Value::Int(10)))
    );
}

#[test]
fn collect_without_aggregator_returns_declaration_order_list() {
    let table = scored_table(HitPolicy::Collect, &["20", "10"]);
    assert_eq!(
        table.evaluate(&scored_context()),
        Ok(Some(Value::List(vec![Value::Int(20), Value::Int(10)])))
    );
}

fn collected_table(aggregator: Aggregator, grants: &[&str]) -> dmntab::DecisionTable {
    let mut builder = DecisionTableBuilder::new("grants")
        .hit_policy(HitPolicy::Collect)
        .aggregator(aggregator)
        .input("score")
        .output(|o| o.name("grant"));
    for grant in grants {
        builder = builder.rule(|r| r.when(["-"]).then([*grant]));
    }
    builder.build().unwrap()
}

#[test]
fn collect_sum_of_integers_stays_integer() {
    let table = collected_table(Aggregator::Sum, &["10", "20", "30"]);
    assert_eq!(
        table.evaluate(&scored_context()),
        Ok(Some(Value::Int(60)))
    );
}

#[test]
fn collect_sum_with_a_float_goes_float() {
    let table = collected_table(Aggregator::Sum, &["10", "2.5"]);
    assert_eq!(
        table.evaluate(&scored_context()),
        Ok(Some(Value::Float(12.5)))
    );
}

#[test]
fn collect_min_and_max() {
    let min = collected_table(Aggregator::Min, &["20", "10", "30"]);
    assert_eq!(min.evaluate(&scored_context()), Ok(Some(Value::Int(10))));

    let max = collected_table(Aggregator::Max, &["20", "2.5", "30"]);
    assert_eq!(max.evaluate(&scored_context()), Ok(Some(Value::Int(30))));
}

#[test]
fn collect_count_counts_matches_regardless_of_output_type() {
    let table = collected_table(Aggregator::Count, &["\"a\"", "\"b\""]);
    assert_eq!(table.evaluate(&scored_context()), Ok(Some(Value::Int(2))));
}

#[test]
fn collect_sum_rejects_non_numeric_outputs() {
    let table = collected_table(Aggregator::Sum, &["10", "\"a\""]);
    assert_eq!(
        table.evaluate(&scored_context()),
        Err(EvalError::NumericAggregation {
            detail: "SUM requires numeric outputs, found \"a\"".into()
        })
    );
}

#[test]
fn defaults_shape_like_rule_outputs() {
    // No default on any output: absent.
    let bare = DecisionTableBuilder::new("t")
        .input("score")
        .output(|o| o.name("a"))
        .output(|o| o.name("b"))
        .build()
        .unwrap();
    assert_eq!(bare.evaluate(&scored_context()), Ok(None));

    // One default among several outputs: the bare value.
    let one = DecisionTableBuilder::new("t")
        .input("score")
        .output(|o| o.name("a").default("10"))
        .output(|o| o.name("b"))
        .build()
        .unwrap();
    assert_eq!(one.evaluate(&scored_context()), Ok(Some(Value::Int(10))));

    // Defaults on both outputs: the full mapping.
    let both = DecisionTableBuilder::new("t")
        .input("score")
        .output(|o| o.name("a").default("10"))
        .output(|o| o.name("b").default("20"))
        .build()
        .unwrap();
    let expected = Value::Map(BTreeMap::from([
        ("a".to_owned(), Value::Int(10)),
        ("b".to_owned(), Value::Int(20)),
    ]));
    assert_eq!(both.evaluate(&scored_context()), Ok(Some(expected)));
}

#[test]
fn defaults_are_never_evaluated_when_a_rule_matches() {
    // The default expression is unregistered; evaluating it would fail.
    let table = DecisionTableBuilder::new("t")
        .input("score")
        .output(|o| o.name("grant").default("unregistered"))
        .rule(|r| r.when(["-"]).then(["10"]))
        .build()
        .unwrap();
    assert_eq!(
        table.evaluate(&scored_context()),
        Ok(Some(Value::Int(10)))
    );
}

#[test]
fn engine_failures_propagate_verbatim() {
    let table = DecisionTableBuilder::new("t")
        .input("missing")
        .output(|o| o.name("grant"))
        .rule(|r| r.when(["-"]).then(["10"]))
        .build()
        .unwrap();
    let ctx = scored_context().expression("missing", var("missing"));
    assert_eq!(
        table.evaluate(&ctx),
        Err(EvalError::Expression {
            message: "unknown variable 'missing'".into()
        })
    );
}

#[test]
fn output_entries_see_the_unaugmented_variables() {
    // A caller variable named `?` is shadowed inside input entries but
    // visible, unchanged, to output entries.
    let table = DecisionTableBuilder::new("t")
        .input("score")
        .output(|o| o.name("grant"))
        .rule(|r| r.when([">= 5"]).then(["?"]))
        .build()
        .unwrap();
    let ctx = EvalContext::new()
        .variable("score", 50_i64)
        .variable("?", "caller-owned")
        .expression("score", var("score"))
        .expression(">= 5", input_value().gte(5_i64))
        .expression("?", var("?"));

    assert_eq!(
        table.evaluate(&ctx),
        Ok(Some(Value::String("caller-owned".into())))
    );
}
