use pretty_assertions::assert_eq;
use rf_core::{Constraint, Value};
use rf_typing::{
    constraint_of, disjoint, exclude, field_constraint, implies, narrow_or, satisfies, simplify,
    unify,
};

fn samples() -> Vec<Constraint> {
    vec![
        Constraint::IsNumber,
        Constraint::Gt(0.0),
        Constraint::Gte(10.0),
        Constraint::equals(12.0),
        Constraint::or([Constraint::IsNumber, Constraint::IsString]),
        Constraint::record([("x", Constraint::IsNumber)]),
        Constraint::IsObject,
        Constraint::IsArray,
        Constraint::array_of(Constraint::IsNumber),
        Constraint::Any,
        Constraint::Never,
    ]
}

fn shape() -> Constraint {
    Constraint::or([
        Constraint::record([
            ("kind", Constraint::equals("circle")),
            ("radius", Constraint::IsNumber),
        ]),
        Constraint::record([
            ("kind", Constraint::equals("square")),
            ("side", Constraint::IsNumber),
        ]),
    ])
}

#[test]
fn implication_is_reflexive() {
    for c in samples() {
        assert!(implies(&c, &c), "{} should imply itself", c);
    }
}

#[test]
fn implication_is_transitive() {
    let all = samples();
    for a in &all {
        for b in &all {
            for c in &all {
                if implies(a, b) && implies(b, c) {
                    assert!(implies(a, c), "{} => {} => {} but not {} => {}", a, b, c, a, c);
                }
            }
        }
    }
}

#[test]
fn never_and_any_are_extremes() {
    for c in samples() {
        assert!(implies(&Constraint::Never, &c));
        assert!(implies(&c, &Constraint::Any));
    }
    assert!(!implies(&Constraint::Any, &Constraint::IsNumber));
    assert!(!implies(&Constraint::IsNumber, &Constraint::Never));
}

#[test]
fn contradictions_simplify_to_never() {
    assert_eq!(
        simplify(&Constraint::and([Constraint::IsNumber, Constraint::IsString])),
        Constraint::Never
    );
    assert_eq!(
        simplify(&Constraint::and([Constraint::equals(5.0), Constraint::equals(6.0)])),
        Constraint::Never
    );
    assert_eq!(
        simplify(&Constraint::and([Constraint::Gt(5.0), Constraint::Lt(1.0)])),
        Constraint::Never
    );
    assert_eq!(
        simplify(&Constraint::and([Constraint::IsNumber, Constraint::not(Constraint::IsNumber)])),
        Constraint::Never
    );
    assert_eq!(
        simplify(&Constraint::has_field("x", Constraint::Never)),
        Constraint::Never
    );
    assert!(!simplify(&Constraint::and([Constraint::IsNumber, Constraint::Gt(0.0)])).is_never());
}

#[test]
fn simplification_is_canonical() {
    let a = Constraint::and([Constraint::Gt(0.0), Constraint::IsNumber, Constraint::Any]);
    let b = Constraint::and([Constraint::IsNumber, Constraint::and([Constraint::Gt(0.0)])]);
    assert_eq!(simplify(&a), simplify(&b));
    assert_eq!(simplify(&Constraint::and([])), Constraint::Any);
    assert_eq!(simplify(&Constraint::or([])), Constraint::Never);
    assert_eq!(simplify(&Constraint::not(Constraint::not(Constraint::IsNull))), Constraint::IsNull);
    assert_eq!(simplify(&Constraint::not(Constraint::Any)), Constraint::Never);
}

#[test]
fn literal_absorbs_compatible_conjuncts() {
    let c = Constraint::and([Constraint::IsNumber, Constraint::Gt(0.0), Constraint::equals(3.0)]);
    assert_eq!(simplify(&c), Constraint::equals(3.0));
    let bad = Constraint::and([Constraint::Gt(4.0), Constraint::equals(3.0)]);
    assert_eq!(simplify(&bad), Constraint::Never);
}

#[test]
fn subsumed_branches_are_dropped() {
    let c = Constraint::or([Constraint::Gt(5.0), Constraint::IsNumber, Constraint::equals(1.0)]);
    assert_eq!(simplify(&c), Constraint::IsNumber);
}

#[test]
fn narrow_or_keeps_only_matching_kinds() {
    let union = Constraint::or([Constraint::IsNumber, Constraint::IsString]);
    let narrowed = narrow_or(&union, &Constraint::IsNumber);
    assert!(implies(&narrowed, &Constraint::IsNumber));
    assert!(!implies(&narrowed, &Constraint::IsString));
}

#[test]
fn discriminated_union_narrows_by_field() {
    let circle = unify(&shape(), &Constraint::has_field("kind", Constraint::equals("circle")));
    assert!(implies(&circle, &Constraint::has_field("radius", Constraint::IsNumber)));
    assert_eq!(field_constraint(&circle, "kind"), Constraint::equals("circle"));

    let not_circle = exclude(&shape(), &Constraint::has_field("kind", Constraint::equals("circle")));
    assert!(implies(&not_circle, &Constraint::has_field("side", Constraint::IsNumber)));
}

#[test]
fn constraint_of_is_exact_for_literals() {
    for value in [Value::number(3), Value::string("hi"), Value::Bool(false), Value::Null] {
        let c = constraint_of(&value);
        assert!(implies(&c, &value.kind().constraint()));
        assert!(implies(&c, &Constraint::Equals(value.clone())));
        assert!(satisfies(&value, &c));
    }
}

#[test]
fn constraint_of_objects_is_open() {
    let point = Value::object([("x", Value::number(1)), ("y", Value::number(2))]);
    let c = constraint_of(&point);
    assert!(implies(&c, &Constraint::record([("x", Constraint::IsNumber)])));
    assert!(!implies(&Constraint::record([("x", Constraint::IsNumber)]), &c));
}

#[test]
fn fixed_tuple_implies_homogeneous_array() {
    let tuple = Constraint::tuple([Constraint::equals(1.0), Constraint::Gt(3.0)]);
    assert!(implies(&tuple, &Constraint::elements(Constraint::IsNumber)));
    assert!(!implies(&tuple, &Constraint::elements(Constraint::Gt(2.0))));
}

#[test]
fn functions_and_arrays_are_objects() {
    assert!(implies(&Constraint::IsArray, &Constraint::IsObject));
    assert!(implies(&Constraint::IsFunction, &Constraint::IsObject));
    assert!(!implies(&Constraint::IsObject, &Constraint::IsArray));
    assert!(disjoint(&Constraint::IsArray, &Constraint::IsFunction));
}

fn list(name: &str) -> Constraint {
    Constraint::rec(
        name,
        Constraint::or([
            Constraint::IsNull,
            Constraint::record([
                ("head", Constraint::IsNumber),
                ("tail", Constraint::rec_ref(name)),
            ]),
        ]),
    )
}

#[test]
fn recursive_constraints_compare_up_to_renaming() {
    assert!(implies(&list("A"), &list("B")));
    assert!(implies(&list("A"), &Constraint::or([Constraint::IsNull, Constraint::IsObject])));
    assert!(!implies(&list("A"), &Constraint::IsNull));
}

#[test]
fn recursive_union_narrows_when_refined() {
    let non_empty = unify(&list("L"), &Constraint::not(Constraint::IsNull));
    assert!(implies(&non_empty, &Constraint::has_field("head", Constraint::IsNumber)));
    let tail = field_constraint(&non_empty, "tail");
    assert_eq!(tail, simplify(&list("T")));
}

#[test]
fn nan_literals_are_reflexive() {
    let nan = constraint_of(&Value::number(f64::NAN));
    assert!(implies(&nan, &nan));
    assert!(!unify(&nan, &nan).is_never());
    assert!(implies(&nan, &Constraint::IsNumber));
    assert!(!implies(&nan, &Constraint::Gt(0.0)));
    assert!(satisfies(&Value::number(f64::NAN), &nan));

    let record = constraint_of(&Value::object([("x", Value::number(f64::NAN))]));
    assert!(implies(&record, &record));
}

#[test]
fn failed_comparisons_leave_room_for_nan() {
    let neither = unify(
        &Constraint::not(Constraint::Gt(0.0)),
        &Constraint::and([Constraint::IsNumber, Constraint::not(Constraint::Lte(0.0))]),
    );
    assert!(!neither.is_never());
    assert!(satisfies(&Value::number(f64::NAN), &neither));

    let bounded = unify(&Constraint::Gte(-5.0), &Constraint::not(Constraint::Gt(0.0)));
    assert!(implies(&bounded, &Constraint::Lte(0.0)));
}

#[test]
fn projections_of_unguarded_recursion_know_nothing() {
    let loose = Constraint::rec(
        "T",
        Constraint::or([Constraint::rec_ref("T"), Constraint::IsObject]),
    );
    assert_eq!(field_constraint(&loose, "a"), Constraint::Any);
}
