//! `map`, `filter` and `fold`: iterated at compile time when the receiver
//! has a known length, residual runtime calls otherwise. A residual `fold`
//! is the runtime method `xs.reduce(f, init)`.

use super::{arg, array_arg, Apply, Builtin, BuiltinRegistry, ResultRule, StagingContext};
use crate::svalue::SValue;
use rf_core::{type_bail, Constraint, Result, Value};
use tracing::debug;

pub fn register_all(registry: &mut BuiltinRegistry) {
    registry.register(
        Builtin::staged(
            "map",
            vec![Constraint::IsArray, Constraint::IsFunction],
            ResultRule::Pattern(Constraint::IsArray),
            map,
            stage_map,
        )
        .runtime_method("map"),
    );
    registry.register(
        Builtin::staged(
            "filter",
            vec![
                Constraint::array_of(Constraint::Var(0)),
                Constraint::IsFunction,
            ],
            ResultRule::Pattern(Constraint::array_of(Constraint::Var(0))),
            filter,
            stage_filter,
        )
        .runtime_method("filter"),
    );
    registry.register(
        Builtin::staged(
            "fold",
            vec![Constraint::IsArray, Constraint::Any, Constraint::IsFunction],
            ResultRule::Pattern(Constraint::Any),
            fold,
            stage_fold,
        )
        .runtime_method("reduce")
        .method_order(&[2, 1]),
    );
}

fn map(apply: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let callback = arg(args, 1)?;
    let items = array_arg(args, 0)?
        .iter()
        .map(|item| apply.apply(callback, vec![item.clone()]))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(items))
}

fn filter(apply: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let callback = arg(args, 1)?;
    let mut kept = Vec::new();
    for item in array_arg(args, 0)? {
        match apply.apply(callback, vec![item.clone()])? {
            Value::Bool(true) => kept.push(item.clone()),
            Value::Bool(false) => {}
            other => type_bail!("`filter` predicate returned {}", other.repr()),
        }
    }
    Ok(Value::Array(kept))
}

fn fold(apply: &mut dyn Apply, args: &[Value]) -> Result<Value> {
    let callback = arg(args, 2)?;
    array_arg(args, 0)?
        .iter()
        .try_fold(arg(args, 1)?.clone(), |acc, item| {
            apply.apply(callback, vec![acc, item.clone()])
        })
}

/// Elements of a receiver whose length is known.
fn known_elements(receiver: &SValue) -> Option<Vec<SValue>> {
    match receiver {
        SValue::Now {
            value: Value::Array(items),
            ..
        } => Some(items.iter().cloned().map(SValue::now).collect()),
        SValue::LaterArray { elements, .. } => Some(elements.clone()),
        _ => None,
    }
}

fn callable(callback: &SValue) -> bool {
    matches!(
        callback,
        SValue::Closure(_)
            | SValue::Now {
                value: Value::Builtin(_),
                ..
            }
    )
}

fn stage_map(cx: &mut dyn StagingContext, args: &[SValue]) -> Result<Option<SValue>> {
    let (Some(elements), [_, callback]) = (known_elements(&args[0]), args) else {
        return Ok(None);
    };
    if !callable(callback) {
        return Ok(None);
    }
    let mut results = Vec::with_capacity(elements.len());
    for element in elements {
        let result = cx.invoke(callback, vec![element])?;
        if !result.is_now() {
            debug!("map callback result is not known, emitting a runtime call");
            return Ok(None);
        }
        results.push(result);
    }
    Ok(Some(SValue::array(results)))
}

fn stage_filter(cx: &mut dyn StagingContext, args: &[SValue]) -> Result<Option<SValue>> {
    let (Some(elements), [_, callback]) = (known_elements(&args[0]), args) else {
        return Ok(None);
    };
    if !callable(callback) {
        return Ok(None);
    }
    let mut kept = Vec::new();
    for element in elements {
        match cx.invoke(callback, vec![element.clone()])?.as_value() {
            Some(Value::Bool(true)) => kept.push(element),
            Some(Value::Bool(false)) => {}
            Some(other) => type_bail!("`filter` predicate returned {}", other.repr()),
            None => {
                debug!("filter predicate is not known, emitting a runtime call");
                return Ok(None);
            }
        }
    }
    Ok(Some(SValue::array(kept)))
}

fn stage_fold(cx: &mut dyn StagingContext, args: &[SValue]) -> Result<Option<SValue>> {
    let (Some(elements), [_, init, callback]) = (known_elements(&args[0]), args) else {
        return Ok(None);
    };
    if !callable(callback) {
        return Ok(None);
    }
    let mut acc = init.clone();
    for element in elements {
        acc = cx.invoke(callback, vec![acc, element])?;
        if !acc.is_now() {
            debug!("fold accumulator is not known, emitting a runtime call");
            return Ok(None);
        }
    }
    Ok(Some(acc))
}
