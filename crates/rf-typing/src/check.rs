use crate::rec::unfold;
use rf_core::{Constraint, Value};

const MAX_UNFOLDS: usize = 4096;

/// Whether a known value belongs to `c`.
///
/// `Rec` is unfolded freely: values are finite, so each unfolding either
/// descends into the value or hits a non-recursive branch. Unguarded
/// recursion is cut off after a fixed number of unfoldings.
pub fn satisfies(value: &Value, c: &Constraint) -> bool {
    Membership { unfolds: 0 }.check(value, c)
}

struct Membership {
    unfolds: usize,
}

impl Membership {
    fn check(&mut self, value: &Value, c: &Constraint) -> bool {
        match c {
            Constraint::Any => true,
            Constraint::Never => false,
            Constraint::Equals(expected) => value == expected,
            Constraint::Gt(n) => value.as_number().is_some_and(|v| v > *n),
            Constraint::Gte(n) => value.as_number().is_some_and(|v| v >= *n),
            Constraint::Lt(n) => value.as_number().is_some_and(|v| v < *n),
            Constraint::Lte(n) => value.as_number().is_some_and(|v| v <= *n),
            Constraint::HasField(name, inner) => match value {
                Value::Object(fields) => fields
                    .get(name)
                    .is_some_and(|field| self.check(field, inner)),
                _ => false,
            },
            Constraint::Elements(inner) => match value {
                Value::Array(items) => items.iter().all(|item| self.check(item, inner)),
                _ => false,
            },
            Constraint::Length(inner) => match value {
                Value::Array(items) => self.check(&Value::Number(items.len() as f64), inner),
                _ => false,
            },
            Constraint::ElementAt(index, inner) => match value {
                Value::Array(items) => items
                    .get(*index)
                    .is_some_and(|item| self.check(item, inner)),
                _ => false,
            },
            Constraint::And(items) => items.iter().all(|item| self.check(value, item)),
            Constraint::Or(items) => items.iter().any(|item| self.check(value, item)),
            Constraint::Not(inner) => !self.check(value, inner),
            Constraint::Rec(_) => {
                self.unfolds += 1;
                self.unfolds <= MAX_UNFOLDS && self.check(value, &unfold(c))
            }
            Constraint::RecVar(_) | Constraint::RecRef(_) | Constraint::Var(_) => true,
            kind => kind
                .kind_hint()
                .is_some_and(|expected| value.kind().refines(expected)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn recursive_lists_accept_finite_values() {
        let list = Constraint::rec(
            "L",
            Constraint::or([
                Constraint::IsNull,
                Constraint::record([
                    ("head", Constraint::IsNumber),
                    ("tail", Constraint::rec_ref("L")),
                ]),
            ]),
        );
        let two = Value::object([
            ("head", Value::number(1)),
            (
                "tail",
                Value::object([("head", Value::number(2)), ("tail", Value::Null)]),
            ),
        ]);
        assert!(satisfies(&two, &list));
        let broken = Value::object([("head", Value::string("x")), ("tail", Value::Null)]);
        assert_eq!(satisfies(&broken, &list), false);
    }

    #[test]
    fn arrays_are_objects() {
        assert!(satisfies(&Value::array([]), &Constraint::IsObject));
        assert!(!satisfies(&Value::object::<&str>([]), &Constraint::IsArray));
    }
}
