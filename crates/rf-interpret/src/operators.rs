//! Operator, projection and pattern semantics shared by the pure and the
//! staged evaluator.

use rf_core::ast::{BinOpKind, Expr, Pattern, UnOpKind};
use rf_core::{type_bail, Constraint, Result, Value};
use rf_typing::satisfies;

pub fn binary(op: BinOpKind, lhs: &Value, rhs: &Value) -> Result<Value> {
    use BinOpKind::*;
    match op {
        Add => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", lhs, rhs)))
            }
            _ => type_bail!("cannot add {} and {}", lhs.repr(), rhs.repr()),
        },
        Sub | Mul | Div | Mod => {
            let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
                type_bail!(
                    "operator `{}` expects numbers, got {} and {}",
                    op,
                    lhs.repr(),
                    rhs.repr()
                )
            };
            Ok(Value::Number(match op {
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => a % b,
            }))
        }
        Lt | Le | Gt | Ge => {
            let ordering = match (lhs, rhs) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => type_bail!(
                    "cannot compare {} with {}",
                    lhs.repr(),
                    rhs.repr()
                ),
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                Lt => ordering.is_lt(),
                Le => ordering.is_le(),
                Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        Eq => Ok(Value::Bool(lhs.equals(rhs))),
        Ne => Ok(Value::Bool(!lhs.equals(rhs))),
        And | Or => match (lhs, rhs) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == And {
                *a && *b
            } else {
                *a || *b
            })),
            _ => type_bail!(
                "operator `{}` expects booleans, got {} and {}",
                op,
                lhs.repr(),
                rhs.repr()
            ),
        },
    }
}

pub fn unary(op: UnOpKind, operand: &Value) -> Result<Value> {
    match (op, operand) {
        (UnOpKind::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnOpKind::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnOpKind::Neg, other) => type_bail!("cannot negate {}", other.repr()),
        (UnOpKind::Not, other) => type_bail!("`!` expects a boolean, got {}", other.repr()),
    }
}

/// A condition value; only booleans qualify.
pub fn condition(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => type_bail!("condition must be a boolean, got {}", other.repr()),
    }
}

pub fn field(object: &Value, name: &str) -> Result<Value> {
    match object {
        Value::Object(fields) => match fields.get(name) {
            Some(value) => Ok(value.clone()),
            None => type_bail!("{} has no field `{}`", object.repr(), name),
        },
        Value::Array(items) if name == "length" => Ok(Value::Number(items.len() as f64)),
        Value::String(s) if name == "length" => Ok(Value::Number(s.chars().count() as f64)),
        other => type_bail!("cannot read field `{}` of {}", name, other.repr()),
    }
}

/// An integral, non-negative number usable as an index.
pub fn as_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
        _ => None,
    }
}

pub fn index(object: &Value, key: &Value) -> Result<Value> {
    match (object, key) {
        (Value::Object(_), Value::String(name)) => field(object, name),
        (Value::Array(items), key) => match as_index(key).and_then(|i| items.get(i)) {
            Some(item) => Ok(item.clone()),
            None => type_bail!("index {} out of bounds for {}", key.repr(), object.repr()),
        },
        (Value::String(s), key) => match as_index(key).and_then(|i| s.chars().nth(i)) {
            Some(c) => Ok(Value::String(c.to_string())),
            None => type_bail!("index {} out of bounds for {}", key.repr(), object.repr()),
        },
        _ => type_bail!("cannot index {} with {}", object.repr(), key.repr()),
    }
}

/// Matches `value` against `pattern`, returning the bindings on success.
///
/// `ty` evaluates the type expression of a type pattern.
pub fn match_pattern(
    value: &Value,
    pattern: &Pattern,
    ty: &mut dyn FnMut(&Expr) -> Result<Constraint>,
) -> Result<Option<Vec<(String, Value)>>> {
    let mut bindings = Vec::new();
    if collect_matches(value, pattern, ty, &mut bindings)? {
        Ok(Some(bindings))
    } else {
        Ok(None)
    }
}

fn collect_matches(
    value: &Value,
    pattern: &Pattern,
    ty: &mut dyn FnMut(&Expr) -> Result<Constraint>,
    out: &mut Vec<(String, Value)>,
) -> Result<bool> {
    match pattern {
        Pattern::Wildcard => Ok(true),
        Pattern::Binding(name) => {
            out.push((name.clone(), value.clone()));
            Ok(true)
        }
        Pattern::Literal(literal) => Ok(*value == literal.to_value()),
        Pattern::Object(fields) => {
            let Value::Object(map) = value else {
                return Ok(false);
            };
            for field in fields {
                match map.get(&field.name) {
                    Some(inner) if collect_matches(inner, &field.pattern, ty, out)? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        Pattern::Array(array) => {
            let Value::Array(items) = value else {
                return Ok(false);
            };
            let fits = match array.rest {
                Some(_) => items.len() >= array.items.len(),
                None => items.len() == array.items.len(),
            };
            if !fits {
                return Ok(false);
            }
            for (item, pattern) in items.iter().zip(&array.items) {
                if !collect_matches(item, pattern, ty, out)? {
                    return Ok(false);
                }
            }
            if let Some(rest) = &array.rest {
                out.push((rest.clone(), Value::array(items[array.items.len()..].to_vec())));
            }
            Ok(true)
        }
        Pattern::Type(typed) => {
            let constraint = ty(&typed.ty)?;
            if !satisfies(value, &constraint) {
                return Ok(false);
            }
            collect_matches(value, &typed.inner, ty, out)
        }
    }
}

/// Text spliced into a template string.
pub fn template_piece(value: &Value) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn addition_concatenates_when_a_string_is_involved() -> Result<()> {
        assert_eq!(
            binary(BinOpKind::Add, &Value::string("n = "), &Value::number(2))?,
            Value::string("n = 2")
        );
        assert_eq!(binary(BinOpKind::Add, &Value::number(2), &Value::number(3))?, Value::number(5));
        assert!(binary(BinOpKind::Add, &Value::Bool(true), &Value::number(3)).is_err());
        Ok(())
    }

    #[test]
    fn missing_fields_are_type_errors() {
        let point = Value::object([("x", Value::number(1))]);
        assert!(matches!(field(&point, "y"), Err(rf_core::Error::Type { .. })));
        assert_eq!(field(&Value::array([Value::Null]), "length").ok(), Some(Value::number(1)));
    }
}
