//! Compile-time reflection over types.

use super::{arg, array_arg, type_arg, Apply, Builtin, BuiltinRegistry, ResultRule, StagingContext};
use crate::svalue::SValue;
use rf_core::{type_bail, Constraint, Error, Result, Value};
use rf_typing::{constraint_of, field_constraint, implies, simplify};
use std::sync::Arc;

pub fn register_all(registry: &mut BuiltinRegistry) {
    let ty = || ResultRule::Pattern(Constraint::IsType);
    let reflective = [
        Builtin::pure(
            "fields",
            vec![Constraint::IsType],
            ResultRule::Pattern(Constraint::array_of(Constraint::IsString)),
            fields,
        ),
        Builtin::pure(
            "fieldType",
            vec![Constraint::IsType, Constraint::IsString],
            ty(),
            field_type,
        ),
        Builtin::pure("objectType", vec![Constraint::IsObject], ty(), object_type),
        Builtin::pure(
            "unionType",
            vec![Constraint::IsType, Constraint::IsType],
            ty(),
            |_, args| Ok(Value::ty(simplify(&Constraint::or([type_arg(args, 0)?.clone(), type_arg(args, 1)?.clone()])))),
        ),
        Builtin::pure(
            "intersectionType",
            vec![Constraint::IsType, Constraint::IsType],
            ty(),
            |_, args| Ok(Value::ty(simplify(&Constraint::and([type_arg(args, 0)?.clone(), type_arg(args, 1)?.clone()])))),
        ),
        Builtin::staged("recType", vec![Constraint::IsFunction], ty(), rec_type, stage_rec_type),
        Builtin::pure(
            "objectFromEntries",
            vec![Constraint::IsArray],
            ResultRule::Pattern(Constraint::IsObject),
            object_from_entries,
        ),
        Builtin::pure("arrayType", vec![Constraint::IsType], ty(), |_, args| {
            Ok(Value::ty(Constraint::array_of(type_arg(args, 0)?.clone())))
        }),
        Builtin::pure("tupleType", vec![Constraint::IsArray], ty(), tuple_type),
        Builtin::pure("literalType", vec![Constraint::Any], ty(), |_, args| {
            Ok(Value::ty(constraint_of(arg(args, 0)?)))
        }),
        Builtin::pure(
            "typeImplies",
            vec![Constraint::IsType, Constraint::IsType],
            ResultRule::Pattern(Constraint::IsBool),
            |_, args| Ok(Value::Bool(implies(type_arg(args, 0)?, type_arg(args, 1)?))),
        ),
    ];
    for builtin in reflective {
        registry.register(builtin.comptime_only());
    }
}

/// Field names a type requires, in canonical order.
fn fields(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let names: Vec<Value> = match simplify(type_arg(args, 0)?) {
        Constraint::HasField(name, _) => vec![Value::string(name)],
        Constraint::And(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Constraint::HasField(name, _) => Some(Value::string(name)),
                _ => None,
            })
            .collect(),
        Constraint::Equals(Value::Object(map)) => {
            map.keys().map(|k| Value::string(k.clone())).collect()
        }
        _ => Vec::new(),
    };
    Ok(Value::Array(names))
}

fn field_type(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let Value::String(name) = arg(args, 1)? else {
        type_bail!("`fieldType` expects a field name")
    };
    Ok(Value::ty(field_constraint(type_arg(args, 0)?, name)))
}

fn object_type(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let Value::Object(map) = arg(args, 0)? else {
        type_bail!("`objectType` expects an object of types")
    };
    let mut fields = Vec::with_capacity(map.len());
    for (name, value) in map {
        match value {
            Value::Type(c) => fields.push((name.clone(), c.as_ref().clone())),
            other => type_bail!("field `{}` of `objectType` is {}, not a type", name, other.repr()),
        }
    }
    Ok(Value::ty(simplify(&Constraint::record(fields))))
}

fn tuple_type(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let items = array_arg(args, 0)?
        .iter()
        .map(|item| match item {
            Value::Type(c) => Ok(c.as_ref().clone()),
            other => type_bail!("`tupleType` element {} is not a type", other.repr()),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::ty(Constraint::tuple(items)))
}

fn object_from_entries(_: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let mut map = indexmap::IndexMap::new();
    for entry in array_arg(args, 0)? {
        match entry {
            Value::Array(pair) => match pair.as_slice() {
                [Value::String(name), value] => {
                    map.insert(name.clone(), value.clone());
                }
                _ => type_bail!("entry {} is not a [name, value] pair", entry.repr()),
            },
            other => type_bail!("entry {} is not a [name, value] pair", other.repr()),
        }
    }
    Ok(Value::Object(map))
}

/// The self-reference name handed to a `recType` builder; distinct per
/// builder so nested recursive types do not capture each other.
fn self_name(lambda: &Arc<rf_core::ast::Lambda>) -> String {
    format!("Self{}", Arc::as_ptr(lambda) as usize)
}

fn close(name: &str, body: &Value) -> Result<Value> {
    match body {
        Value::Type(c) => Ok(Value::ty(Constraint::rec(name, c.as_ref().clone()))),
        other => type_bail!("`recType` builder returned {}, not a type", other.repr()),
    }
}

fn rec_type(apply: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let builder = arg(args, 0)?;
    let name = match builder {
        Value::Closure(closure) => self_name(&closure.lambda),
        _ => "Self".to_string(),
    };
    let body = apply.apply(builder, vec![Value::ty(Constraint::rec_ref(name.clone()))])?;
    close(&name, &body)
}

fn stage_rec_type(cx: &mut dyn StagingContext, args: &[SValue]) -> Result<Option<SValue>> {
    let name = match args.first() {
        Some(SValue::Closure(closure)) => self_name(&closure.lambda),
        _ => "Self".to_string(),
    };
    let self_type = SValue::now(Value::ty(Constraint::rec_ref(name.clone())));
    let body = cx.invoke(&args[0], vec![self_type])?;
    match body.as_value() {
        Some(value) => Ok(Some(SValue::now(close(&name, value)?))),
        None => Err(Error::staging(
            "`recType` builder must produce a type at compile time",
        )),
    }
}
