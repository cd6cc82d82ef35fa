use pretty_assertions::assert_eq;
use rf_core::ast::build::*;
use rf_core::{Constraint, Error, Result, Value};
use rf_interpret::{
    run, BuiltinRegistry, ImportTable, ImportedBinding, StageOptions, StagingOrchestrator,
};
use std::sync::Arc;

fn numbers(items: &[f64]) -> Value {
    Value::Array(items.iter().copied().map(Value::from).collect())
}

#[test]
fn arithmetic_and_lets() -> Result<()> {
    let program = let_in("x", add(num(2), num(3)), mul(var("x"), num(4)));
    assert_eq!(run(&program)?, Value::from(20.0));
    Ok(())
}

#[test]
fn untaken_branch_is_never_evaluated() -> Result<()> {
    let program = if_else(boolean(true), num(1), assert_that(boolean(false)));
    assert_eq!(run(&program)?, Value::from(1.0));
    Ok(())
}

#[test]
fn named_lambdas_recurse() -> Result<()> {
    let fact = named_lambda(
        "fact",
        &["n"],
        if_else(
            le(var("n"), num(1)),
            num(1),
            mul(var("n"), call_fn("fact", vec![sub(var("n"), num(1))])),
        ),
    );
    let program = let_in("fact", fact, call_fn("fact", vec![num(5)]));
    assert_eq!(run(&program)?, Value::from(120.0));
    Ok(())
}

#[test]
fn closures_capture_their_environment() -> Result<()> {
    let program = let_in(
        "k",
        num(10),
        let_in(
            "addK",
            lambda(&["v"], add(var("v"), var("k"))),
            let_in("k", num(0), call_fn("addK", vec![num(1)])),
        ),
    );
    assert_eq!(run(&program)?, Value::from(11.0));
    Ok(())
}

#[test]
fn object_spread_overrides_in_order() -> Result<()> {
    let program = let_in(
        "base",
        object(vec![("a", num(1)), ("b", num(2))]),
        field(
            object_entries(vec![spread_entry(var("base")), entry("b", num(3))]),
            "b",
        ),
    );
    assert_eq!(run(&program)?, Value::from(3.0));
    Ok(())
}

#[test]
fn templates_render_numbers_without_fraction() -> Result<()> {
    let program = template(vec![text("n = "), interp(add(num(1), num(2)))]);
    assert_eq!(run(&program)?, Value::from("n = 3"));
    Ok(())
}

#[test]
fn higher_order_builtins() -> Result<()> {
    let items = array(vec![num(1), num(2), num(3), num(4)]);
    let doubled = call_fn("map", vec![items.clone(), lambda(&["x"], mul(var("x"), num(2)))]);
    assert_eq!(run(&doubled)?, numbers(&[2.0, 4.0, 6.0, 8.0]));

    let even = call_fn(
        "filter",
        vec![items.clone(), lambda(&["x"], eq(rem(var("x"), num(2)), num(0)))],
    );
    assert_eq!(run(&even)?, numbers(&[2.0, 4.0]));

    let sum = call_fn(
        "fold",
        vec![items, num(0), lambda(&["acc", "x"], add(var("acc"), var("x")))],
    );
    assert_eq!(run(&sum)?, Value::from(10.0));
    Ok(())
}

#[test]
fn method_calls_use_builtins_unless_the_object_has_the_field() -> Result<()> {
    let sliced = call(
        field(array(vec![num(1), num(2), num(3)]), "slice"),
        vec![num(1), num(3)],
    );
    assert_eq!(run(&sliced)?, numbers(&[2.0, 3.0]));

    let own = call(
        field(object(vec![("slice", lambda(&[], string("own")))]), "slice"),
        vec![],
    );
    assert_eq!(run(&own)?, Value::from("own"));
    Ok(())
}

#[test]
fn reduce_takes_the_callback_before_the_initial_value() -> Result<()> {
    let program = call(
        field(array(vec![num(1), num(2), num(3)]), "reduce"),
        vec![lambda(&["acc", "x"], add(var("acc"), var("x"))), num(10)],
    );
    assert_eq!(run(&program)?, Value::from(16.0));
    Ok(())
}

#[test]
fn nan_equals_nothing() -> Result<()> {
    let program = let_in(
        "nan",
        div(num(0), num(0)),
        array(vec![eq(var("nan"), var("nan")), ne(var("nan"), var("nan"))]),
    );
    assert_eq!(
        run(&program)?,
        Value::Array(vec![Value::Bool(false), Value::Bool(true)])
    );
    Ok(())
}

#[test]
fn match_destructures_objects() -> Result<()> {
    let program = match_(
        object(vec![("kind", string("circle")), ("r", num(2))]),
        vec![
            case(
                p_object(vec![("kind", p_lit(string("square"))), ("side", p_bind("s"))]),
                mul(var("s"), var("s")),
            ),
            case(
                p_object(vec![("kind", p_lit(string("circle"))), ("r", p_bind("r"))]),
                mul(num(3), mul(var("r"), var("r"))),
            ),
        ],
    );
    assert_eq!(run(&program)?, Value::from(12.0));
    Ok(())
}

#[test]
fn array_patterns_bind_the_rest() -> Result<()> {
    let program = let_pat(
        p_array(vec![p_bind("head")], Some("tail")),
        array(vec![num(1), num(2), num(3)]),
        array(vec![var("head"), call_fn("length", vec![var("tail")])]),
    );
    assert_eq!(run(&program)?, numbers(&[1.0, 2.0]));
    Ok(())
}

#[test]
fn type_assertions() -> Result<()> {
    assert_eq!(run(&assert_type(num(5), var("number")))?, Value::from(5.0));
    let err = run(&assert_type(string("hello"), var("number"))).unwrap_err();
    assert!(matches!(err, Error::Assertion { .. }), "{:?}", err);
    Ok(())
}

#[test]
fn throw_is_an_uncaught_error() {
    match run(&throw(string("boom"))) {
        Err(Error::Thrown { value }) => assert_eq!(value, Value::from("boom")),
        other => panic!("expected a thrown value, got {:?}", other),
    }
}

#[test]
fn unbound_names_are_type_errors() {
    let err = run(&var("missing")).unwrap_err();
    assert!(matches!(err, Error::Type { .. }), "{:?}", err);
}

#[test]
fn call_depth_is_bounded() {
    let forever = named_lambda("loop", &["n"], call_fn("loop", vec![var("n")]));
    let program = let_in("loop", forever, call_fn("loop", vec![num(0)]));
    let orchestrator = StagingOrchestrator::new(Arc::new(BuiltinRegistry::standard()))
        .with_options(StageOptions {
            max_call_depth: 8,
            ..StageOptions::default()
        });
    let err = orchestrator.run(&program).unwrap_err();
    assert!(matches!(err, Error::Staging { .. }), "{:?}", err);
}

#[test]
fn imports_resolve_values_but_not_declarations() -> Result<()> {
    let mut imports = ImportTable::new();
    imports
        .insert("config", "limit", ImportedBinding::Value(Value::from(10.0)))
        .insert("env", "n", ImportedBinding::Declared(Constraint::IsNumber));
    let orchestrator =
        StagingOrchestrator::new(Arc::new(BuiltinRegistry::standard())).with_imports(imports);

    let known = block(
        vec![import_item(&["limit"], "config")],
        mul(var("limit"), num(2)),
    );
    assert_eq!(orchestrator.run(&known)?, Value::from(20.0));

    let declared = block(vec![import_item(&["n"], "env")], var("n"));
    assert!(orchestrator.run(&declared).is_err());
    Ok(())
}
