use dmntab::{DecisionTableBuilder, EvalContext, input_value, lit, var};

fn main() {
    // Order discount table: business customers with large orders get 10%,
    // small business orders 5%, everyone else falls back to the default.
    let table = DecisionTableBuilder::new("discount")
        .input("customer")
        .input("orderSize")
        .output(|o| o.name("discount").default("0.0"))
        .rule(|r| r.when(["\"Business\"", ">= 5"]).then(["0.1"]))
        .rule(|r| r.when(["\"Business\"", "< 5"]).then(["0.05"]))
        .build()
        .expect("failed to build decision table");

    for (customer, order_size) in [("Business", 7_i64), ("Business", 2), ("Private", 9)] {
        let ctx = EvalContext::new()
            .variable("customer", customer)
            .variable("orderSize", order_size)
            .expression("customer", var("customer"))
            .expression("orderSize", var("orderSize"))
            .expression("\"Business\"", input_value().eq("Business"))
            .expression(">= 5", input_value().gte(5_i64))
            .expression("< 5", input_value().lt(5_i64))
            .expression("0.1", lit(0.1))
            .expression("0.05", lit(0.05))
            .expression("0.0", lit(0.0));

        match table.evaluate(&ctx) {
            Ok(Some(result)) => println!("{customer} x{order_size}: discount {result}"),
            Ok(None) => println!("{customer} x{order_size}: no result"),
            Err(err) => println!("{customer} x{order_size}: failed: {err}"),
        }
    }
}
