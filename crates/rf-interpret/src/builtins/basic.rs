//! Guards, collection helpers, arithmetic helpers and type constants.

use super::{arg, array_arg, number_arg, Apply, Builtin, BuiltinRegistry, ResultRule};
use crate::refine::guard_kind;
use itertools::Itertools;
use rf_core::{type_bail, Constraint, Result, Value};
use rf_typing::{disjoint, implies, length_constraint};

pub fn register_all(registry: &mut BuiltinRegistry) {
    for name in [
        "isNumber",
        "isString",
        "isBool",
        "isNull",
        "isObject",
        "isArray",
        "isFunction",
    ] {
        registry.register(Builtin::pure(
            name,
            vec![Constraint::Any],
            ResultRule::Compute(guard_result(name)),
            guard_eval(name),
        ));
    }

    let sequence = Constraint::or([Constraint::IsArray, Constraint::IsString]);
    let elements = || Constraint::array_of(Constraint::Var(0));

    registry.register(Builtin::pure(
        "length",
        vec![sequence],
        ResultRule::Compute(|args| length_constraint(&args[0])),
        length,
    ));
    registry.register(Builtin::pure(
        "keys",
        vec![Constraint::IsObject],
        ResultRule::Pattern(Constraint::array_of(Constraint::IsString)),
        keys,
    ));
    registry.register(Builtin::pure(
        "values",
        vec![Constraint::IsObject],
        ResultRule::Pattern(Constraint::IsArray),
        values,
    ));
    registry.register(Builtin::pure(
        "entries",
        vec![Constraint::IsObject],
        ResultRule::Pattern(Constraint::array_of(Constraint::tuple([
            Constraint::IsString,
            Constraint::Any,
        ]))),
        entries,
    ));
    registry.register(Builtin::pure(
        "concat",
        vec![elements(), elements()],
        ResultRule::Pattern(elements()),
        concat,
    ));
    registry.register(Builtin::pure(
        "append",
        vec![elements(), Constraint::Var(0)],
        ResultRule::Pattern(elements()),
        append,
    ));
    registry.register(
        Builtin::pure(
            "slice",
            vec![elements(), Constraint::IsNumber, Constraint::IsNumber],
            ResultRule::Pattern(elements()),
            slice,
        )
        .runtime_method("slice"),
    );
    registry.register(
        Builtin::pure(
            "includes",
            vec![Constraint::IsArray, Constraint::Any],
            ResultRule::Pattern(Constraint::IsBool),
            includes,
        )
        .runtime_method("includes"),
    );
    registry.register(
        Builtin::pure(
            "join",
            vec![Constraint::IsArray, Constraint::IsString],
            ResultRule::Pattern(Constraint::IsString),
            join,
        )
        .runtime_method("join"),
    );
    registry.register(Builtin::pure(
        "range",
        vec![Constraint::IsNumber, Constraint::IsNumber],
        ResultRule::Pattern(Constraint::array_of(Constraint::IsNumber)),
        range,
    ));
    registry.register(Builtin::pure(
        "toString",
        vec![Constraint::Any],
        ResultRule::Pattern(Constraint::IsString),
        to_string,
    ));
    registry.register(Builtin::pure(
        "abs",
        vec![Constraint::IsNumber],
        ResultRule::Pattern(Constraint::and([Constraint::IsNumber, Constraint::Gte(0.0)])),
        |_, args| Ok(Value::Number(number_arg(args, 0)?.abs())),
    ));
    registry.register(Builtin::pure(
        "floor",
        vec![Constraint::IsNumber],
        ResultRule::Pattern(Constraint::IsNumber),
        |_, args| Ok(Value::Number(number_arg(args, 0)?.floor())),
    ));
    registry.register(Builtin::pure(
        "min",
        vec![Constraint::IsNumber, Constraint::IsNumber],
        ResultRule::Pattern(Constraint::IsNumber),
        |_, args| Ok(Value::Number(number_arg(args, 0)?.min(number_arg(args, 1)?))),
    ));
    registry.register(Builtin::pure(
        "max",
        vec![Constraint::IsNumber, Constraint::IsNumber],
        ResultRule::Pattern(Constraint::IsNumber),
        |_, args| Ok(Value::Number(number_arg(args, 0)?.max(number_arg(args, 1)?))),
    ));

    for (name, c) in [
        ("number", Constraint::IsNumber),
        ("string", Constraint::IsString),
        ("boolean", Constraint::IsBool),
        ("nullType", Constraint::IsNull),
        ("object", Constraint::IsObject),
        ("array", Constraint::IsArray),
        ("function", Constraint::IsFunction),
        ("any", Constraint::Any),
        ("never", Constraint::Never),
    ] {
        registry.register_constant(name, Value::ty(c));
    }
}

fn guard_result(name: &str) -> fn(&[Constraint]) -> Constraint {
    macro_rules! decide {
        ($kind:expr) => {
            |args: &[Constraint]| {
                let kind = $kind;
                if implies(&args[0], &kind) {
                    Constraint::equals(true)
                } else if disjoint(&args[0], &kind) {
                    Constraint::equals(false)
                } else {
                    Constraint::IsBool
                }
            }
        };
    }
    match name {
        "isNumber" => decide!(Constraint::IsNumber),
        "isString" => decide!(Constraint::IsString),
        "isBool" => decide!(Constraint::IsBool),
        "isNull" => decide!(Constraint::IsNull),
        "isObject" => decide!(Constraint::IsObject),
        "isArray" => decide!(Constraint::IsArray),
        _ => decide!(Constraint::IsFunction),
    }
}

fn guard_eval(name: &str) -> super::PureFn {
    macro_rules! test {
        ($name:literal) => {
            |_: &mut dyn Apply, args: &[Value]| {
                let kind = guard_kind($name).and_then(|c| c.kind_hint());
                let value = arg(args, 0)?;
                Ok(Value::Bool(kind.is_some_and(|k| value.kind().refines(k))))
            }
        };
    }
    match name {
        "isNumber" => test!("isNumber"),
        "isString" => test!("isString"),
        "isBool" => test!("isBool"),
        "isNull" => test!("isNull"),
        "isObject" => test!("isObject"),
        "isArray" => test!("isArray"),
        _ => test!("isFunction"),
    }
}

fn length(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    match arg(args, 0)? {
        Value::Array(items) => Ok(Value::Number(items.len() as f64)),
        Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
        other => type_bail!("`length` expects an array or a string, got {}", other.repr()),
    }
}

fn object_arg(args: &[Value]) -> Result<&indexmap::IndexMap<String, Value>> {
    match arg(args, 0)? {
        Value::Object(fields) => Ok(fields),
        other => type_bail!("expected an object, got {}", other.repr()),
    }
}

fn keys(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    Ok(Value::array(
        object_arg(args)?.keys().map(|k| Value::string(k.clone())),
    ))
}

fn values(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    Ok(Value::array(object_arg(args)?.values().cloned()))
}

fn entries(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    Ok(Value::array(object_arg(args)?.iter().map(|(k, v)| {
        Value::array([Value::string(k.clone()), v.clone()])
    })))
}

fn concat(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let mut items = array_arg(args, 0)?.to_vec();
    items.extend_from_slice(array_arg(args, 1)?);
    Ok(Value::Array(items))
}

fn append(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let mut items = array_arg(args, 0)?.to_vec();
    items.push(arg(args, 1)?.clone());
    Ok(Value::Array(items))
}

/// Clamp a possibly negative or fractional offset into `0..=len`.
fn offset(n: f64, len: usize) -> usize {
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

fn slice(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let items = array_arg(args, 0)?;
    let start = offset(number_arg(args, 1)?, items.len());
    let end = offset(number_arg(args, 2)?, items.len());
    Ok(Value::array(
        items.get(start..end.max(start)).unwrap_or_default().to_vec(),
    ))
}

fn includes(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let needle = arg(args, 1)?;
    Ok(Value::Bool(array_arg(args, 0)?.contains(needle)))
}

fn join(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let separator = match arg(args, 1)? {
        Value::String(s) => s.clone(),
        other => type_bail!("`join` separator must be a string, got {}", other.repr()),
    };
    Ok(Value::String(array_arg(args, 0)?.iter().join(&separator)))
}

fn range(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let start = number_arg(args, 0)?;
    let end = number_arg(args, 1)?;
    let mut items = Vec::new();
    let mut n = start;
    while n < end {
        items.push(Value::Number(n));
        n += 1.0;
    }
    Ok(Value::Array(items))
}

fn to_string(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    Ok(Value::String(arg(args, 0)?.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinRegistry;
    use pretty_assertions::assert_eq;

    struct NoApply;

    impl Apply for NoApply {
        fn apply(&mut self, callee: &Value, _: Vec<Value>) -> Result<Value> {
            type_bail!("cannot call {}", callee)
        }
    }

    #[test]
    fn guards_decide_from_constraints() {
        let registry = BuiltinRegistry::standard();
        let Some(is_number) = registry.get("isNumber") else {
            panic!("isNumber is registered");
        };
        assert_eq!(
            is_number.result_constraint(&[Constraint::and([Constraint::IsNumber, Constraint::Gt(1.0)])]),
            Constraint::equals(true)
        );
        assert_eq!(
            is_number.result_constraint(&[Constraint::IsString]),
            Constraint::equals(false)
        );
        assert_eq!(
            is_number.result_constraint(&[Constraint::Any]),
            Constraint::IsBool
        );
    }

    #[test]
    fn slice_clamps_offsets() -> Result<()> {
        let items = Value::array([1, 2, 3, 4].map(|n| Value::number(n)));
        let out = slice(&mut NoApply, &[items, Value::number(1), Value::number(-1)])?;
        assert_eq!(out, Value::array([Value::number(2), Value::number(3)]));
        Ok(())
    }

    #[test]
    fn append_widens_the_element_type() {
        let registry = BuiltinRegistry::standard();
        let Some(append) = registry.get("append") else {
            panic!("append is registered");
        };
        let result = append.result_constraint(&[
            Constraint::array_of(Constraint::IsNumber),
            Constraint::IsString,
        ]);
        assert!(implies(
            &result,
            &Constraint::array_of(Constraint::or([Constraint::IsNumber, Constraint::IsString]))
        ));
    }
}
