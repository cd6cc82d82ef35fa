use pretty_assertions::assert_eq;
use rf_core::ast::build::*;
use rf_core::ast::visit::count_exprs;
use rf_core::ast::{Expr, ExprKind};
use rf_core::{Constraint, Error, Result, Value};
use rf_interpret::{
    run, stage, BuiltinRegistry, ImportTable, ImportedBinding, StageOutcome, StagingOrchestrator,
};
use rf_typing::implies;
use std::sync::Arc;

fn with_imports(imports: ImportTable) -> StagingOrchestrator {
    StagingOrchestrator::new(Arc::new(BuiltinRegistry::standard())).with_imports(imports)
}

fn env_import(name: &str, c: Constraint) -> ImportTable {
    let mut imports = ImportTable::new();
    imports.insert("env", name, ImportedBinding::Declared(c));
    imports
}

fn calls_to(expr: &Expr, name: &str) -> usize {
    count_exprs(expr, |e| {
        matches!(&e.kind, ExprKind::Call(call) if call.callee.as_var() == Some(name))
    })
}

fn lambdas(expr: &Expr) -> usize {
    count_exprs(expr, |e| matches!(e.kind, ExprKind::Lambda(_)))
}

/// Runs the residual with the runtime inputs bound by `let`.
fn run_residual(outcome: &StageOutcome, inputs: &[(&str, Expr)]) -> Result<Value> {
    let program = inputs
        .iter()
        .rev()
        .fold(outcome.residual.clone(), |body, (name, value)| {
            let_in(name, value.clone(), body)
        });
    run(&program)
}

#[test]
fn known_programs_reduce_to_a_value() -> Result<()> {
    let program = let_in("x", add(num(2), num(3)), mul(var("x"), num(4)));
    let outcome = stage(&program)?;
    assert_eq!(outcome.value(), Some(&Value::from(20.0)));
    assert_eq!(outcome.residual.to_string(), "20");
    assert!(!outcome.has_errors);
    Ok(())
}

#[test]
fn staged_and_direct_evaluation_agree() -> Result<()> {
    let program = let_in(
        "items",
        array(vec![num(1), num(2), num(3)]),
        call_fn(
            "fold",
            vec![
                call_fn("map", vec![var("items"), lambda(&["x"], mul(var("x"), var("x")))]),
                num(0),
                lambda(&["acc", "x"], add(var("acc"), var("x"))),
            ],
        ),
    );
    let staged = stage(&program)?;
    assert_eq!(staged.value(), Some(&run(&program)?));
    assert_eq!(staged.value(), Some(&Value::from(14.0)));
    Ok(())
}

#[test]
fn untaken_branch_is_never_staged() -> Result<()> {
    let program = if_else(boolean(true), num(1), assert_that(boolean(false)));
    assert_eq!(stage(&program)?.value(), Some(&Value::from(1.0)));
    Ok(())
}

#[test]
fn compile_time_flags_erase_dead_code() -> Result<()> {
    let program = let_in(
        "debug",
        boolean(false),
        let_in(
            "x",
            runtime(num(10), "x"),
            if_else(
                var("debug"),
                assert_that(gt(var("x"), num(100))),
                add(var("x"), num(1)),
            ),
        ),
    );
    let outcome = stage(&program)?;
    assert_eq!(outcome.residual.to_string(), "x + 1");
    assert_eq!(outcome.constraint(), Constraint::equals(11.0));
    assert!(outcome.value().is_none());
    assert_eq!(calls_to(&outcome.residual, "assert"), 0);
    Ok(())
}

#[test]
fn runtime_values_stay_residual() -> Result<()> {
    let outcome = stage(&mul(runtime(num(3), "n"), num(2)))?;
    assert_eq!(outcome.residual.to_string(), "n * 2");
    assert!(outcome.value().is_none());
    assert!(implies(&outcome.constraint(), &Constraint::IsNumber));
    Ok(())
}

#[test]
fn shared_function_is_emitted_once() -> Result<()> {
    let program = let_in(
        "double",
        lambda(&["v"], mul(var("v"), num(2))),
        let_in(
            "a",
            runtime(num(1), "a"),
            let_in(
                "b",
                runtime(num(2), "b"),
                array(vec![
                    call_fn("double", vec![var("a")]),
                    call_fn("double", vec![var("b")]),
                    call_fn("double", vec![add(var("a"), var("b"))]),
                ]),
            ),
        ),
    );
    let outcome = stage(&program)?;
    assert_eq!(
        outcome.residual.to_string(),
        "let double = fn double(v) { v * 2 } in [double(a), double(b), double(a + b)]"
    );
    assert_eq!(lambdas(&outcome.residual), 1);
    assert_eq!(calls_to(&outcome.residual, "double"), 3);

    let result = run_residual(&outcome, &[("a", num(1)), ("b", num(2))])?;
    assert_eq!(result, Value::Array(vec![2.0.into(), 4.0.into(), 6.0.into()]));
    Ok(())
}

fn factorial() -> Expr {
    named_lambda(
        "fact",
        &["n"],
        if_else(
            le(var("n"), num(1)),
            num(1),
            mul(var("n"), call_fn("fact", vec![sub(var("n"), num(1))])),
        ),
    )
}

#[test]
fn recursion_on_known_arguments_runs_at_compile_time() -> Result<()> {
    let program = let_in("fact", factorial(), call_fn("fact", vec![num(5)]));
    let outcome = stage(&program)?;
    assert_eq!(outcome.value(), Some(&Value::from(120.0)));
    assert_eq!(lambdas(&outcome.residual), 0);
    Ok(())
}

#[test]
fn recursion_on_runtime_arguments_emits_a_definition() -> Result<()> {
    let program = let_in(
        "fact",
        factorial(),
        call_fn("fact", vec![runtime(num(5), "input")]),
    );
    let outcome = stage(&program)?;
    assert_eq!(
        outcome.residual.to_string(),
        "let fact = fn fact(n) { if n <= 1 then 1 else n * fact(n - 1) } in fact(input)"
    );
    assert_eq!(lambdas(&outcome.residual), 1);
    assert_eq!(
        run_residual(&outcome, &[("input", num(5))])?,
        Value::from(120.0)
    );
    Ok(())
}

#[test]
fn comptime_parameters_get_one_specialization_per_value() -> Result<()> {
    let scale = lambda(&["k", "x"], mul(comptime(var("k")), var("x")));
    let program = let_in(
        "scale",
        scale,
        array(vec![
            call_fn("scale", vec![num(2), runtime(num(1), "a")]),
            call_fn("scale", vec![num(3), runtime(num(1), "a")]),
            call_fn("scale", vec![num(2), runtime(num(5), "b")]),
        ]),
    );
    let outcome = stage(&program)?;
    assert_eq!(outcome.specializations, 2);
    assert_eq!(lambdas(&outcome.residual), 2);
    assert_eq!(calls_to(&outcome.residual, "scale_1"), 2);
    assert_eq!(calls_to(&outcome.residual, "scale_2"), 1);

    let result = run_residual(&outcome, &[("a", num(1)), ("b", num(5))])?;
    assert_eq!(result, Value::Array(vec![2.0.into(), 3.0.into(), 10.0.into()]));
    Ok(())
}

#[test]
fn comptime_of_a_runtime_value_is_a_staging_error() {
    let err = stage(&comptime(runtime(num(1), "a"))).unwrap_err();
    assert!(matches!(err, Error::Staging { .. }), "{:?}", err);
}

#[test]
fn type_guards_narrow_each_branch() -> Result<()> {
    let program = block(
        vec![import_item(&["x"], "env")],
        if_else(
            call_fn("isNumber", vec![var("x")]),
            add(var("x"), num(1)),
            call_fn("length", vec![var("x")]),
        ),
    );
    let imports = env_import(
        "x",
        Constraint::or([Constraint::IsNumber, Constraint::IsString]),
    );
    let outcome = with_imports(imports).stage(&program)?;
    assert_eq!(
        outcome.residual.to_string(),
        r#"{ import { x } from "env"; if isNumber(x) then x + 1 else length(x) }"#
    );
    assert!(implies(&outcome.constraint(), &Constraint::IsNumber));
    Ok(())
}

#[test]
fn assertions_refine_the_rest_of_a_block() -> Result<()> {
    let union = Constraint::or([Constraint::IsNumber, Constraint::IsString]);
    let unchecked = block(vec![import_item(&["n"], "env")], add(var("n"), num(1)));
    let outcome = with_imports(env_import("n", union.clone())).stage(&unchecked)?;
    assert!(!implies(&outcome.constraint(), &Constraint::IsNumber));

    let checked = block(
        vec![
            import_item(&["n"], "env"),
            expr_item(assert_that(call_fn("isNumber", vec![var("n")]))),
        ],
        add(var("n"), num(1)),
    );
    let outcome = with_imports(env_import("n", union)).stage(&checked)?;
    assert!(implies(&outcome.constraint(), &Constraint::IsNumber));
    assert_eq!(calls_to(&outcome.residual, "assert"), 1);
    Ok(())
}

#[test]
fn type_assertions_on_known_values() -> Result<()> {
    let outcome = stage(&assert_type(num(5), var("number")))?;
    assert_eq!(outcome.value(), Some(&Value::from(5.0)));

    let err = stage(&assert_type(string("hello"), var("number"))).unwrap_err();
    assert!(matches!(err, Error::Assertion { .. }), "{:?}", err);
    Ok(())
}

#[test]
fn failing_known_assertion_is_an_error() {
    let err = stage(&assert_that(lt(num(2), num(1)))).unwrap_err();
    assert!(matches!(err, Error::Assertion { .. }), "{:?}", err);
}

#[test]
fn incompatible_operands_are_rejected() {
    let program = sub(runtime(string("s"), "s"), num(1));
    let err = stage(&program).unwrap_err();
    assert!(matches!(err, Error::Type { .. }), "{:?}", err);
}

#[test]
fn trusting_an_incompatible_type_warns() -> Result<()> {
    let outcome = stage(&trust(runtime(string("s"), "s"), var("number")))?;
    assert_eq!(outcome.warnings().count(), 1);
    assert_eq!(outcome.constraint(), Constraint::IsNumber);
    assert!(!outcome.has_errors);
    Ok(())
}

#[test]
fn type_of_reports_the_known_constraint() -> Result<()> {
    let outcome = stage(&type_of(runtime(num(3), "n")))?;
    assert_eq!(
        outcome.value(),
        Some(&Value::from(Constraint::equals(3.0)))
    );
    Ok(())
}

#[test]
fn known_collections_run_higher_order_builtins() -> Result<()> {
    let program = call_fn(
        "filter",
        vec![
            array(vec![num(1), num(2), num(3), num(4)]),
            lambda(&["x"], gt(var("x"), num(2))),
        ],
    );
    let outcome = stage(&program)?;
    assert_eq!(
        outcome.value(),
        Some(&Value::Array(vec![3.0.into(), 4.0.into()]))
    );
    Ok(())
}

#[test]
fn match_on_a_known_constraint_selects_one_case() -> Result<()> {
    let program = match_(
        runtime(num(2), "n"),
        vec![
            case(p_lit(num(1)), string("one")),
            case(p_wild(), string("other")),
        ],
    );
    let outcome = stage(&program)?;
    assert_eq!(outcome.value(), Some(&Value::from("other")));
    Ok(())
}

#[test]
fn match_on_known_objects_destructures_at_compile_time() -> Result<()> {
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
    let outcome = stage(&program)?;
    assert_eq!(outcome.value(), Some(&Value::from(12.0)));
    assert_eq!(outcome.value(), Some(&run(&program)?));
    Ok(())
}

#[test]
fn match_on_runtime_values_is_residual() -> Result<()> {
    let program = block(
        vec![import_item(&["n"], "env")],
        match_(
            var("n"),
            vec![
                case(p_lit(num(0)), string("zero")),
                case(p_wild(), string("other")),
            ],
        ),
    );
    let outcome = with_imports(env_import("n", Constraint::IsNumber)).stage(&program)?;
    assert!(
        outcome
            .residual
            .to_string()
            .contains(r#"match n { 0 => "zero"; _ => "other"; }"#),
        "{}",
        outcome.residual
    );
    assert!(implies(&outcome.constraint(), &Constraint::IsString));
    Ok(())
}

#[test]
fn imports_of_values_are_known() -> Result<()> {
    let mut imports = ImportTable::new();
    imports.insert("config", "limit", ImportedBinding::Value(Value::from(10.0)));
    let program = block(
        vec![import_item(&["limit"], "config")],
        mul(var("limit"), num(2)),
    );
    let outcome = with_imports(imports).stage(&program)?;
    assert_eq!(outcome.value(), Some(&Value::from(20.0)));
    Ok(())
}

#[test]
fn unknown_exports_are_type_errors() {
    let program = block(vec![import_item(&["nope"], "config")], var("nope"));
    let err = stage(&program).unwrap_err();
    assert!(matches!(err, Error::Type { .. }), "{:?}", err);
}

#[test]
fn missing_fields_of_known_records_are_type_errors() {
    let program = field(object(vec![("a", num(1))]), "b");
    let err = stage(&program).unwrap_err();
    assert!(matches!(err, Error::Type { .. }), "{:?}", err);
}

#[test]
fn partially_known_objects_keep_known_fields() -> Result<()> {
    let program = let_in(
        "point",
        object(vec![("x", num(1)), ("y", runtime(num(2), "y"))]),
        add(field(var("point"), "x"), num(10)),
    );
    let outcome = stage(&program)?;
    assert_eq!(outcome.value(), Some(&Value::from(11.0)));
    Ok(())
}

#[test]
fn templates_with_runtime_parts_are_strings() -> Result<()> {
    let program = template(vec![
        text("n = "),
        interp(num(1)),
        text(", m = "),
        interp(runtime(num(2), "m")),
    ]);
    let outcome = stage(&program)?;
    assert_eq!(outcome.residual.to_string(), "`n = 1, m = ${m}`");
    assert_eq!(outcome.constraint(), Constraint::IsString);
    Ok(())
}

fn counter_until_limit() -> Expr {
    block(
        vec![import_item(&["limit"], "env")],
        let_in(
            "f",
            named_lambda(
                "f",
                &["n"],
                if_else(
                    ge(var("n"), var("limit")),
                    var("n"),
                    call_fn("f", vec![add(var("n"), num(1))]),
                ),
            ),
            call_fn("f", vec![num(0)]),
        ),
    )
}

fn env_values(values: &[(&str, Value)]) -> StagingOrchestrator {
    let mut imports = ImportTable::new();
    for (name, value) in values {
        imports.insert("env", *name, ImportedBinding::Value(value.clone()));
    }
    with_imports(imports)
}

#[test]
fn recursion_bounded_by_a_runtime_value_emits_a_definition() -> Result<()> {
    let program = counter_until_limit();
    let outcome = with_imports(env_import("limit", Constraint::IsNumber)).stage(&program)?;
    assert!(!outcome.has_errors);
    assert_eq!(lambdas(&outcome.residual), 1);
    assert_eq!(calls_to(&outcome.residual, "f"), 2);
    assert!(
        outcome.residual.to_string().contains("else f(1)"),
        "{}",
        outcome.residual
    );

    let limit = |n: f64| env_values(&[("limit", Value::from(n))]);
    assert_eq!(limit(3.0).run(&outcome.residual)?, Value::from(3.0));
    assert_eq!(limit(-1.0).run(&outcome.residual)?, Value::from(0.0));
    assert_eq!(
        limit(3.0).run(&outcome.residual)?,
        limit(3.0).run(&program)?
    );
    Ok(())
}

#[test]
fn failed_comparisons_keep_the_nan_branch() -> Result<()> {
    let program = block(
        vec![import_item(&["x"], "env")],
        if_else(
            gt(var("x"), num(0)),
            string("pos"),
            if_else(le(var("x"), num(0)), string("nonpos"), string("nan")),
        ),
    );
    let outcome = with_imports(env_import("x", Constraint::IsNumber)).stage(&program)?;
    assert!(
        outcome.residual.to_string().contains(r#""nan""#),
        "{}",
        outcome.residual
    );

    let x = |n: f64| env_values(&[("x", Value::from(n))]);
    assert_eq!(x(f64::NAN).run(&outcome.residual)?, Value::from("nan"));
    assert_eq!(x(-2.0).run(&outcome.residual)?, Value::from("nonpos"));
    Ok(())
}

#[test]
fn nan_comparisons_follow_runtime_equality() -> Result<()> {
    let program = let_in("nan", div(num(0), num(0)), eq(var("nan"), var("nan")));
    let outcome = stage(&program)?;
    assert_eq!(outcome.value(), Some(&Value::Bool(false)));
    assert_eq!(outcome.value(), Some(&run(&program)?));
    Ok(())
}

#[test]
fn fields_of_unguarded_recursive_types_are_unknown() -> Result<()> {
    let loose = call_fn(
        "recType",
        vec![lambda(
            &["T"],
            call_fn("unionType", vec![var("T"), var("object")]),
        )],
    );
    let program = field(
        trust(runtime(object(vec![("a", num(1))]), "o"), loose),
        "a",
    );
    let outcome = stage(&program)?;
    assert!(!outcome.has_errors);
    assert_eq!(outcome.residual.to_string(), "o.a");
    assert_eq!(outcome.constraint(), Constraint::equals(1.0));
    Ok(())
}

#[test]
fn fold_over_a_runtime_array_becomes_reduce() -> Result<()> {
    let program = block(
        vec![import_item(&["xs"], "env")],
        call_fn(
            "fold",
            vec![
                var("xs"),
                num(0),
                lambda(&["acc", "x"], add(var("acc"), var("x"))),
            ],
        ),
    );
    let declared = env_import("xs", Constraint::array_of(Constraint::IsNumber));
    let outcome = with_imports(declared).stage(&program)?;
    assert_eq!(calls_to(&outcome.residual, "fold"), 0);
    let text = outcome.residual.to_string();
    assert!(text.contains("xs.reduce("), "{}", text);
    assert!(text.ends_with(", 0) }"), "{}", text);

    let xs = Value::Array(vec![1.0.into(), 2.0.into(), 3.0.into()]);
    let result = env_values(&[("xs", xs)]).run(&outcome.residual)?;
    assert_eq!(result, Value::from(6.0));
    Ok(())
}

#[test]
fn indexing_uses_what_is_known_about_elements() -> Result<()> {
    let mut imports = env_import(
        "pair",
        Constraint::tuple([Constraint::IsNumber, Constraint::IsString]),
    );
    imports.insert("env", "i", ImportedBinding::Declared(Constraint::IsNumber));
    let indexed = |key: Expr| block(vec![import_item(&["pair", "i"], "env")], index(var("pair"), key));

    let known = with_imports(imports.clone()).stage(&indexed(num(1)))?;
    assert!(implies(&known.constraint(), &Constraint::IsString));

    let unknown = with_imports(imports).stage(&indexed(var("i")))?;
    let c = unknown.constraint();
    assert!(implies(&c, &Constraint::or([Constraint::IsNumber, Constraint::IsString])));
    assert!(!implies(&c, &Constraint::IsString));

    let row = let_in(
        "row",
        array(vec![runtime(num(1), "a"), string("s")]),
        add(index(var("row"), num(0)), num(1)),
    );
    let outcome = stage(&row)?;
    assert_eq!(outcome.residual.to_string(), "a + 1");
    Ok(())
}

#[test]
fn callbacks_with_runtime_results_stay_runtime_calls() -> Result<()> {
    let shifted = block(
        vec![import_item(&["n"], "env")],
        call_fn(
            "map",
            vec![
                array(vec![num(1), num(2)]),
                lambda(&["x"], add(var("x"), var("n"))),
            ],
        ),
    );
    let outcome = with_imports(env_import("n", Constraint::IsNumber)).stage(&shifted)?;
    assert!(outcome.residual.to_string().contains(".map("), "{}", outcome.residual);
    assert!(implies(&outcome.constraint(), &Constraint::IsArray));
    let n = || env_values(&[("n", Value::from(10.0))]);
    assert_eq!(
        n().run(&outcome.residual)?,
        Value::Array(vec![11.0.into(), 12.0.into()])
    );

    let above = block(
        vec![import_item(&["n"], "env")],
        call_fn(
            "filter",
            vec![
                array(vec![num(1), num(2), num(3)]),
                lambda(&["x"], gt(var("x"), var("n"))),
            ],
        ),
    );
    let outcome = with_imports(env_import("n", Constraint::IsNumber)).stage(&above)?;
    assert!(outcome.residual.to_string().contains(".filter("), "{}", outcome.residual);
    let one = env_values(&[("n", Value::from(1.0))]);
    assert_eq!(
        one.run(&outcome.residual)?,
        Value::Array(vec![2.0.into(), 3.0.into()])
    );
    Ok(())
}

#[test]
fn comptime_flags_select_a_branch() -> Result<()> {
    let program = let_in(
        "DEBUG",
        boolean(false),
        let_in(
            "x",
            runtime(num(10), "x"),
            if_else(
                comptime(var("DEBUG")),
                assert_that(gt(var("x"), num(100))),
                add(var("x"), num(1)),
            ),
        ),
    );
    let outcome = stage(&program)?;
    assert_eq!(outcome.residual.to_string(), "x + 1");
    assert_eq!(calls_to(&outcome.residual, "assert"), 0);
    Ok(())
}

#[test]
fn known_compounds_used_twice_are_bound_once() -> Result<()> {
    let program = let_in(
        "p",
        object(vec![("a", num(1)), ("b", num(2))]),
        array(vec![var("p"), var("p"), runtime(num(3), "z")]),
    );
    let outcome = stage(&program)?;
    let text = outcome.residual.to_string();
    assert!(text.starts_with("let p = "), "{}", text);
    assert!(text.ends_with(" in [p, p, z]"), "{}", text);
    assert_eq!(
        count_exprs(&outcome.residual, |e| matches!(e.kind, ExprKind::Object(_))),
        1
    );

    let p = Value::object([("a", Value::from(1.0)), ("b", Value::from(2.0))]);
    let result = run_residual(&outcome, &[("z", num(3))])?;
    assert_eq!(result, Value::Array(vec![p.clone(), p, 3.0.into()]));
    Ok(())
}

#[test]
fn type_assertions_on_runtime_values_are_checked_at_runtime() -> Result<()> {
    let program = block(
        vec![import_item(&["x"], "env")],
        assert_type(var("x"), var("number")),
    );
    let union = Constraint::or([Constraint::IsNumber, Constraint::IsString]);
    let outcome = with_imports(env_import("x", union)).stage(&program)?;
    assert_eq!(calls_to(&outcome.residual, "assert"), 1);
    assert!(implies(&outcome.constraint(), &Constraint::IsNumber));

    let x = |v: Value| env_values(&[("x", v)]);
    assert_eq!(x(Value::from(4.0)).run(&outcome.residual)?, Value::from(4.0));
    let err = x(Value::from("four")).run(&outcome.residual).unwrap_err();
    assert!(matches!(err, Error::Assertion { .. }), "{:?}", err);
    Ok(())
}

#[test]
fn trusting_a_partially_known_array_narrows_it() -> Result<()> {
    let program = block(
        vec![import_item(&["a"], "env")],
        trust(
            array(vec![var("a"), num(2)]),
            value(Value::ty(Constraint::array_of(Constraint::Gt(0.0)))),
        ),
    );
    let outcome = with_imports(env_import("a", Constraint::IsNumber)).stage(&program)?;
    assert!(implies(
        &outcome.constraint(),
        &Constraint::array_of(Constraint::Gt(0.0))
    ));
    assert!(
        outcome.residual.to_string().contains("[a, 2]"),
        "{}",
        outcome.residual
    );
    Ok(())
}
