//! Projections of a constraint onto fields, elements and lengths.

use crate::derive::constraint_of;
use crate::rec::unfold;
use crate::simplify::simplify;
use rf_core::{Constraint, Value};

/// Unguarded recursion (`rec T. T | ...`) never reaches a field or element
/// constructor; past this many unfoldings a projection knows nothing.
const MAX_UNFOLDS: usize = 256;

/// What is known about `value.name` given `value: c`.
pub fn field_constraint(c: &Constraint, name: &str) -> Constraint {
    simplify(&Projection::new().field(&simplify(c), name))
}

/// What is known about `value[index]` given `value: c`.
pub fn element_at_constraint(c: &Constraint, index: usize) -> Constraint {
    simplify(&Projection::new().element_at(&simplify(c), index))
}

/// What is known about an element at an index that is not known statically.
pub fn element_constraint(c: &Constraint) -> Constraint {
    simplify(&Projection::new().element(&simplify(c)))
}

/// What is known about `value.length` given `value: c`.
pub fn length_constraint(c: &Constraint) -> Constraint {
    simplify(&Projection::new().length(&simplify(c)))
}

fn non_negative() -> Constraint {
    Constraint::and([Constraint::IsNumber, Constraint::Gte(0.0)])
}

struct Projection {
    unfolds: usize,
}

impl Projection {
    fn new() -> Self {
        Self { unfolds: 0 }
    }

    /// `c` unrolled once, or `None` once the budget is spent.
    fn unfold(&mut self, c: &Constraint) -> Option<Constraint> {
        self.unfolds += 1;
        (self.unfolds <= MAX_UNFOLDS).then(|| unfold(c))
    }

    fn field(&mut self, c: &Constraint, name: &str) -> Constraint {
        match c {
            Constraint::Never => Constraint::Never,
            Constraint::Equals(Value::Object(fields)) => {
                fields.get(name).map(constraint_of).unwrap_or(Constraint::Any)
            }
            Constraint::HasField(field, inner) if field == name => inner.as_ref().clone(),
            Constraint::And(items) => {
                Constraint::And(items.iter().map(|item| self.field(item, name)).collect())
            }
            Constraint::Or(items) => {
                Constraint::Or(items.iter().map(|item| self.field(item, name)).collect())
            }
            Constraint::Rec(_) => match self.unfold(c) {
                Some(unrolled) => self.field(&unrolled, name),
                None => Constraint::Any,
            },
            _ => Constraint::Any,
        }
    }

    fn element_at(&mut self, c: &Constraint, index: usize) -> Constraint {
        match c {
            Constraint::Never => Constraint::Never,
            Constraint::Equals(Value::Array(items)) => {
                items.get(index).map(constraint_of).unwrap_or(Constraint::Any)
            }
            Constraint::ElementAt(i, inner) if *i == index => inner.as_ref().clone(),
            Constraint::Elements(inner) => inner.as_ref().clone(),
            Constraint::And(items) => Constraint::And(
                items.iter().map(|item| self.element_at(item, index)).collect(),
            ),
            Constraint::Or(items) => Constraint::Or(
                items.iter().map(|item| self.element_at(item, index)).collect(),
            ),
            Constraint::Rec(_) => match self.unfold(c) {
                Some(unrolled) => self.element_at(&unrolled, index),
                None => Constraint::Any,
            },
            _ => Constraint::Any,
        }
    }

    fn element(&mut self, c: &Constraint) -> Constraint {
        match c {
            Constraint::Never => Constraint::Never,
            Constraint::Equals(Value::Array(items)) if !items.is_empty() => {
                Constraint::Or(items.iter().map(constraint_of).collect())
            }
            Constraint::Elements(inner) => inner.as_ref().clone(),
            Constraint::And(items) => {
                let mut parts: Vec<Constraint> =
                    items.iter().map(|item| self.element(item)).collect();
                if let Some(tuple) = tuple_elements(items) {
                    parts.push(tuple);
                }
                Constraint::And(parts)
            }
            Constraint::Or(items) => {
                Constraint::Or(items.iter().map(|item| self.element(item)).collect())
            }
            Constraint::Rec(_) => match self.unfold(c) {
                Some(unrolled) => self.element(&unrolled),
                None => Constraint::Any,
            },
            _ => Constraint::Any,
        }
    }

    fn length(&mut self, c: &Constraint) -> Constraint {
        match c {
            Constraint::Never => Constraint::Never,
            Constraint::Equals(Value::Array(items)) => Constraint::equals(items.len() as f64),
            Constraint::Equals(Value::String(s)) => Constraint::equals(s.chars().count() as f64),
            Constraint::Length(inner) => Constraint::and([
                inner.as_ref().clone(),
                Constraint::IsNumber,
                Constraint::Gte(0.0),
            ]),
            Constraint::ElementAt(index, _) => {
                Constraint::and([Constraint::IsNumber, Constraint::Gt(*index as f64)])
            }
            Constraint::IsArray | Constraint::IsString | Constraint::Elements(_) => {
                non_negative()
            }
            Constraint::And(items) => {
                Constraint::And(items.iter().map(|item| self.length(item)).collect())
            }
            Constraint::Or(items) => {
                Constraint::Or(items.iter().map(|item| self.length(item)).collect())
            }
            Constraint::Rec(_) => match self.unfold(c) {
                Some(unrolled) => self.length(&unrolled),
                None => Constraint::Any,
            },
            _ => Constraint::Any,
        }
    }
}

/// For a fixed-length tuple, the union of its element constraints.
fn tuple_elements(items: &[Constraint]) -> Option<Constraint> {
    let len = items.iter().find_map(|item| match item {
        Constraint::Length(inner) => match inner.as_ref() {
            Constraint::Equals(Value::Number(n)) => Some(*n as usize),
            _ => None,
        },
        _ => None,
    })?;
    if len == 0 {
        return None;
    }
    let elements = (0..len)
        .map(|index| {
            items.iter().find_map(|item| match item {
                Constraint::ElementAt(i, inner) if *i == index => Some(inner.as_ref().clone()),
                _ => None,
            })
        })
        .collect::<Option<Vec<_>>>()?;
    Some(Constraint::Or(elements))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implies::implies;
    use pretty_assertions::assert_eq;

    #[test]
    fn field_of_discriminated_union() {
        let shape = Constraint::or([
            Constraint::record([("kind", Constraint::equals("circle")), ("r", Constraint::IsNumber)]),
            Constraint::record([("kind", Constraint::equals("square")), ("side", Constraint::IsNumber)]),
        ]);
        let kind = field_constraint(&shape, "kind");
        assert!(implies(&kind, &Constraint::IsString));
        assert_eq!(field_constraint(&shape, "r"), Constraint::Any);
    }

    #[test]
    fn tuple_elements_union() {
        let pair = Constraint::tuple([Constraint::equals(1.0), Constraint::equals("a")]);
        let element = element_constraint(&pair);
        assert!(implies(&element, &Constraint::or([Constraint::IsNumber, Constraint::IsString])));
        assert_eq!(element_at_constraint(&pair, 1), Constraint::equals("a"));
        assert_eq!(length_constraint(&pair), Constraint::equals(2.0));
    }

    #[test]
    fn unguarded_recursion_projects_to_any() {
        let loose = Constraint::Rec(Box::new(Constraint::Or(vec![
            Constraint::RecVar(0),
            Constraint::IsObject,
        ])));
        assert_eq!(field_constraint(&loose, "a"), Constraint::Any);
        assert_eq!(element_constraint(&loose), Constraint::Any);
        assert_eq!(element_at_constraint(&loose, 0), Constraint::Any);
    }
}
