use pretty_assertions::assert_eq;
use rf_core::ast::build::*;
use rf_core::ast::{Expr, ExprKind, Lambda};
use rf_optimize::{analyze, count_uses, free_vars, is_pure, is_trivial, mentions};
use std::sync::Arc;

fn lambda_of(expr: Expr) -> Arc<Lambda> {
    match expr.kind {
        ExprKind::Lambda(lambda) => lambda,
        other => panic!("not a lambda: {:?}", other),
    }
}

#[test]
fn direct_comptime_argument_is_sensitive() {
    let f = lambda_of(lambda(
        &["flag", "x"],
        if_else(comptime(var("flag")), var("x"), num(0)),
    ));
    let params = analyze(&f);
    assert!(params.is_sensitive(0));
    assert!(!params.is_sensitive(1));
}

#[test]
fn type_of_counts_as_comptime() {
    let f = lambda_of(lambda(&["x"], type_of(var("x"))));
    assert_eq!(analyze(&f).positions(), vec![0]);
}

#[test]
fn sensitivity_flows_through_lets() {
    let f = lambda_of(lambda(
        &["a", "b"],
        let_in("c", add(var("b"), num(1)), comptime(var("c"))),
    ));
    assert_eq!(analyze(&f).positions(), vec![1]);
}

#[test]
fn shadowing_breaks_the_flow() {
    let f = lambda_of(lambda(&["a"], let_in("a", num(1), comptime(var("a")))));
    assert!(!analyze(&f).any());
}

#[test]
fn args_pseudo_array_maps_to_parameters() {
    let f = lambda_of(lambda(&["a", "b"], comptime(index(var("args"), num(1)))));
    assert_eq!(analyze(&f).positions(), vec![1]);
}

#[test]
fn local_helpers_propagate_sensitivity() {
    let f = lambda_of(lambda(
        &["mode", "x"],
        let_in(
            "pick",
            lambda(&["m"], comptime(var("m"))),
            call_fn("pick", vec![var("mode")]),
        ),
    ));
    assert_eq!(analyze(&f).positions(), vec![0]);
}

#[test]
fn match_bindings_inherit_the_scrutinee() {
    let f = lambda_of(lambda(
        &["opts"],
        match_(var("opts"), vec![case(p_object(vec![("debug", p_bind("d"))]), comptime(var("d")))]),
    ));
    assert_eq!(analyze(&f).positions(), vec![0]);
}

#[test]
fn nested_lambda_parameters_shadow() {
    let f = lambda_of(lambda(&["x"], lambda(&["x"], comptime(var("x")))));
    assert!(!analyze(&f).any());
}

#[test]
fn usage_counts_respect_blocks() {
    let expr = block(
        vec![let_item("y", var("x")), expr_item(var("y"))],
        add(var("y"), var("z")),
    );
    assert_eq!(count_uses(&expr, "x"), 1);
    assert_eq!(count_uses(&expr, "y"), 0);
    assert!(mentions(&expr, "z"));
    assert_eq!(
        free_vars(&expr).into_iter().collect::<Vec<_>>(),
        vec!["x".to_string(), "z".to_string()]
    );
}

#[test]
fn recursive_name_is_bound_in_its_body() {
    let fact = named_lambda(
        "fact",
        &["n"],
        if_else(le(var("n"), num(1)), num(1), mul(var("n"), call_fn("fact", vec![sub(var("n"), num(1))]))),
    );
    assert!(free_vars(&fact).is_empty());
}

#[test]
fn purity_and_triviality() {
    assert!(is_trivial(&var("x")));
    assert!(is_trivial(&num(3)));
    assert!(!is_trivial(&add(var("x"), num(1))));
    assert!(is_pure(&add(var("x"), num(1))));
    assert!(!is_pure(&throw(string("boom"))));
    assert!(!is_pure(&assert_that(var("ok"))));
}
