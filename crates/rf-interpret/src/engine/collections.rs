use super::{Scope, Stager};
use crate::operators;
use crate::svalue::SValue;
use indexmap::IndexMap;
use rf_core::ast::{ArrayEntry, Expr, ExprIndex, ExprKind, Literal, ObjectEntry};
use rf_core::{type_bail, Constraint, Result, Value};
use rf_typing::{
    disjoint, element_at_constraint, element_constraint, field_constraint, implies,
    length_constraint, simplify,
};

enum Part<T> {
    Item(T, SValue),
    Spread(SValue),
}

impl Stager {
    pub(super) fn stage_object(&mut self, entries: &[ObjectEntry], scope: &Scope) -> Result<SValue> {
        let mut parts = Vec::with_capacity(entries.len());
        for entry in entries {
            parts.push(match entry {
                ObjectEntry::Field { name, value } => Part::Item(name.clone(), self.stage(value, scope)?),
                ObjectEntry::Spread(source) => {
                    let value = self.stage(source, scope)?;
                    let c = value.constraint();
                    let not_record = disjoint(&c, &Constraint::IsObject)
                        || implies(&c, &Constraint::IsArray)
                        || implies(&c, &Constraint::IsFunction);
                    if !c.is_never() && not_record {
                        type_bail!("cannot spread {} into an object", c);
                    }
                    Part::Spread(value)
                }
            });
        }

        let mut fields = IndexMap::new();
        let mut opaque_from = None;
        for (i, part) in parts.iter().enumerate() {
            match part {
                Part::Item(name, value) => {
                    fields.insert(name.clone(), value.clone());
                }
                Part::Spread(SValue::Now {
                    value: Value::Object(source),
                    ..
                }) => {
                    for (name, value) in source {
                        fields.insert(name.clone(), SValue::now(value.clone()));
                    }
                }
                Part::Spread(SValue::LaterObject { fields: source, .. }) => {
                    fields.extend(source.iter().map(|(n, v)| (n.clone(), v.clone())));
                }
                Part::Spread(_) => opaque_from = Some(i),
            }
        }
        let Some(last_opaque) = opaque_from else {
            return Ok(SValue::object(fields));
        };

        // Fields written after the last opaque spread are still known.
        let known = parts[last_opaque + 1..].iter().filter_map(|part| match part {
            Part::Item(name, value) => Some((name.clone(), value.constraint())),
            Part::Spread(_) => None,
        });
        let constraint = simplify(&Constraint::record(known.collect::<Vec<_>>()));
        let mut residual = Vec::with_capacity(parts.len());
        for part in &parts {
            residual.push(match part {
                Part::Item(name, value) => ObjectEntry::Field {
                    name: name.clone(),
                    value: self.residualize(value, scope)?,
                },
                Part::Spread(value) => ObjectEntry::Spread(self.residualize(value, scope)?),
            });
        }
        Ok(SValue::later(constraint, Expr::new(ExprKind::Object(residual))))
    }

    pub(super) fn stage_array(&mut self, entries: &[ArrayEntry], scope: &Scope) -> Result<SValue> {
        let mut parts: Vec<Part<()>> = Vec::with_capacity(entries.len());
        for entry in entries {
            parts.push(match entry {
                ArrayEntry::Item(item) => Part::Item((), self.stage(item, scope)?),
                ArrayEntry::Spread(source) => {
                    let value = self.stage(source, scope)?;
                    let c = value.constraint();
                    if !c.is_never() && disjoint(&c, &Constraint::IsArray) {
                        type_bail!("cannot spread {} into an array", c);
                    }
                    Part::Spread(value)
                }
            });
        }

        let mut elements = Vec::with_capacity(parts.len());
        let mut opaque = false;
        for part in &parts {
            match part {
                Part::Item((), value) => elements.push(value.clone()),
                Part::Spread(SValue::Now {
                    value: Value::Array(items),
                    ..
                }) => elements.extend(items.iter().cloned().map(SValue::now)),
                Part::Spread(SValue::LaterArray { elements: items, .. }) => {
                    elements.extend(items.iter().cloned())
                }
                Part::Spread(_) => opaque = true,
            }
        }
        if !opaque {
            return Ok(SValue::array(elements));
        }

        let mut element_constraints = Vec::new();
        let mut residual = Vec::with_capacity(parts.len());
        for part in &parts {
            residual.push(match part {
                Part::Item((), value) => {
                    element_constraints.push(value.constraint());
                    ArrayEntry::Item(self.residualize(value, scope)?)
                }
                Part::Spread(value) => {
                    element_constraints.push(element_constraint(&value.constraint()));
                    ArrayEntry::Spread(self.residualize(value, scope)?)
                }
            });
        }
        let constraint = simplify(&Constraint::array_of(Constraint::Or(element_constraints)));
        Ok(SValue::later(constraint, Expr::new(ExprKind::Array(residual))))
    }

    /// `value.name`
    pub(super) fn field_of(&mut self, value: &SValue, name: &str) -> Result<SValue> {
        match value {
            SValue::Now { value, .. } => Ok(SValue::now(operators::field(value, name)?)),
            SValue::LaterObject { fields, .. } => match fields.get(name) {
                Some(field) => Ok(field.clone()),
                None => type_bail!("object has no field `{}`", name),
            },
            SValue::LaterArray { elements, .. } if name == "length" => {
                Ok(SValue::now(Value::number(elements.len() as f64)))
            }
            SValue::LaterArray { .. } => type_bail!("cannot read field `{}` of an array", name),
            SValue::Closure(_) => type_bail!("cannot read field `{}` of a function", name),
            SValue::Later { constraint, residual } => {
                let sequence = Constraint::or([Constraint::IsArray, Constraint::IsString]);
                let projected = if name == "length" && implies(constraint, &sequence) {
                    length_constraint(constraint)
                } else {
                    if !constraint.is_never() && disjoint(constraint, &Constraint::IsObject) {
                        type_bail!("cannot read field `{}` of {}", name, constraint);
                    }
                    if let Some(Value::Object(fields)) = constraint.literal() {
                        if !fields.contains_key(name) {
                            type_bail!("{} has no field `{}`", constraint, name);
                        }
                    }
                    field_constraint(constraint, name)
                };
                Ok(SValue::later(projected, Expr::field(residual.clone(), name)))
            }
        }
    }

    /// `value[key]`
    pub(super) fn index_of(&mut self, value: &SValue, key: &SValue, scope: &Scope) -> Result<SValue> {
        if let (Some(v), Some(k)) = (value.as_value(), key.as_value()) {
            return Ok(SValue::now(operators::index(v, k)?));
        }
        match (value, key.as_value()) {
            (SValue::LaterArray { elements, .. }, Some(k)) => {
                match operators::as_index(k).and_then(|i| elements.get(i)) {
                    Some(element) => return Ok(element.clone()),
                    None => type_bail!("index {} out of bounds for an array of {}", k.repr(), elements.len()),
                }
            }
            (SValue::LaterObject { .. }, Some(Value::String(name))) => {
                return self.field_of(value, name)
            }
            (SValue::Closure(_), _) => type_bail!("cannot index a function"),
            _ => {}
        }

        let c = value.constraint();
        let indexable = Constraint::or([Constraint::IsObject, Constraint::IsString]);
        if !c.is_never() && disjoint(&c, &indexable) {
            type_bail!("cannot index {}", c);
        }
        let projected = match key.as_value() {
            Some(Value::String(name)) => field_constraint(&c, name),
            Some(k) => match operators::as_index(k) {
                Some(_) if implies(&c, &Constraint::IsString) => Constraint::IsString,
                Some(i) => element_at_constraint(&c, i),
                None => type_bail!("{} is not a valid index", k.repr()),
            },
            None if implies(&c, &Constraint::IsString) => Constraint::IsString,
            None if implies(&c, &Constraint::IsArray) => element_constraint(&c),
            None => Constraint::Any,
        };
        let residual = Expr::new(ExprKind::Index(ExprIndex {
            object: Box::new(self.residualize(value, scope)?),
            index: Box::new(self.residualize(key, scope)?),
        }));
        Ok(SValue::later(projected, residual))
    }

    /// The elements of an array after the first `skip`.
    pub(super) fn rest_of(&mut self, value: &SValue, skip: usize, scope: &Scope) -> Result<SValue> {
        match value {
            SValue::Now {
                value: Value::Array(items),
                ..
            } => Ok(SValue::now(Value::array(
                items.get(skip..).unwrap_or_default().iter().cloned(),
            ))),
            SValue::LaterArray { elements, .. } => Ok(SValue::array(
                elements.get(skip..).unwrap_or_default().to_vec(),
            )),
            SValue::Now { value, .. } => type_bail!("cannot take the rest of {}", value.repr()),
            SValue::LaterObject { .. } | SValue::Closure(_) => {
                type_bail!("cannot take the rest of {}", value.constraint())
            }
            SValue::Later { constraint, .. } => {
                let array = self.residualize(value, scope)?;
                let length = Expr::field(array.clone(), "length");
                let start = Expr::literal(Literal::Number(skip as f64));
                let residual = Expr::call(Expr::field(array, "slice"), vec![start, length]);
                let element = element_constraint(constraint);
                Ok(SValue::later(
                    simplify(&Constraint::array_of(element)),
                    residual,
                ))
            }
        }
    }
}
