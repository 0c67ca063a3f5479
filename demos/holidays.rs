use dmntab::{DecisionTableBuilder, EvalContext, HitPolicy, input_value, lit, var};

fn main() {
    // Holiday entitlements collected from every matching rule and ordered by
    // the output's priority list rather than rule declaration order.
    let table = DecisionTableBuilder::new("holidays")
        .hit_policy(HitPolicy::OutputOrder)
        .input("age")
        .input("yearsOfService")
        .output(|o| o.name("holidays").priorities(["22", "5", "3"]))
        .rule(|r| r.when(["-", "-"]).then(["22"]))
        .rule(|r| r.when(["-", ">= 30"]).then(["3"]))
        .rule(|r| r.when([">= 45", "-"]).then(["5"]))
        .build()
        .expect("failed to build decision table");

    for (age, years) in [(58_i64, 31_i64), (25, 2)] {
        let ctx = EvalContext::new()
            .variable("age", age)
            .variable("yearsOfService", years)
            .expression("age", var("age"))
            .expression("yearsOfService", var("yearsOfService"))
            .expression("-", lit(true))
            .expression(">= 30", input_value().gte(30_i64))
            .expression(">= 45", input_value().gte(45_i64))
            .expression("22", lit(22_i64))
            .expression("3", lit(3_i64))
            .expression("5", lit(5_i64));

        match table.evaluate(&ctx) {
            Ok(Some(result)) => println!("age {age}, {years} years of service: {result}"),
            Ok(None) => println!("age {age}, {years} years of service: no result"),
            Err(err) => println!("age {age}, {years} years of service: failed: {err}"),
        }
    }
}
