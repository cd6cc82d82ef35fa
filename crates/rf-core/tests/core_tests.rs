use pretty_assertions::assert_eq;
use rf_core::ast::build::*;
use rf_core::ast::visit::count_exprs;
use rf_core::ast::{Expr, ExprKind};
use rf_core::{Constraint, Result, Value};

#[test]
fn values_print_like_source() {
    let point = Value::object([("x", Value::number(1)), ("label", Value::string("p"))]);
    assert_eq!(point.to_string(), "{ x: 1, label: \"p\" }");
    assert_eq!(Value::array([Value::number(2.5), Value::Null]).to_string(), "[2.5, null]");
    assert_eq!(Value::ty(Constraint::IsNumber).to_string(), "number");
}

#[test]
fn objects_compare_structurally() {
    let a = Value::object([("x", Value::number(1)), ("y", Value::number(2))]);
    let b = Value::object([("y", Value::number(2)), ("x", Value::number(1))]);
    assert_eq!(a, b);
    assert!(a != Value::object([("x", Value::number(1))]));
}

#[test]
fn expressions_deserialize_from_json() -> Result<()> {
    let json = r#"{
        "Let": {
            "pattern": { "Binding": "x" },
            "init": { "Literal": { "Number": 1 } },
            "body": {
                "Binary": {
                    "op": "Add",
                    "lhs": { "Var": "x" },
                    "rhs": { "Literal": { "Number": 2 } }
                },
                "span": { "lo": 14, "hi": 19 }
            }
        }
    }"#;
    let expr: Expr = serde_json::from_str(json)?;
    let ExprKind::Let(parsed) = &expr.kind else {
        panic!("expected let, got {}", expr);
    };
    assert_eq!(parsed.body.span, Some(rf_core::Span::new(14, 19)));
    assert_eq!(expr.to_string(), "let x = 1 in x + 2");
    Ok(())
}

#[test]
fn pretty_printing_groups_operands() {
    let expr = call_fn(
        "map",
        vec![var("xs"), lambda(&["x"], mul(add(var("x"), num(1)), num(2)))],
    );
    assert_eq!(expr.to_string(), "map(xs, fn(x) { (x + 1) * 2 })");
    let rec = named_lambda("f", &["n"], if_else(le(var("n"), num(0)), num(0), var("n")));
    assert_eq!(rec.to_string(), "fn f(n) { if n <= 0 then 0 else n }");
}

#[test]
fn walk_visits_every_node() {
    let expr = block(
        vec![let_item("a", num(1)), expr_item(var("a"))],
        object(vec![("k", var("a")), ("v", template(vec![text("n="), interp(var("a"))]))]),
    );
    assert_eq!(count_exprs(&expr, |e| e.as_var() == Some("a")), 3);
}

#[test]
fn compound_values_become_literal_syntax() {
    let value = Value::object([("xs", Value::array([Value::number(1), Value::Bool(true)]))]);
    let expr = Expr::from_value(&value).expect("no closures inside");
    assert_eq!(expr.to_string(), "{ xs: [1, true] }");
}
