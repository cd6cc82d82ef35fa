use rf_core::{Constraint, Value};

/// The most specific constraint describing a known value.
///
/// Primitives and types become literal equalities, objects become a
/// conjunction of field constraints and arrays become tuples.
pub fn constraint_of(value: &Value) -> Constraint {
    match value {
        Value::Object(fields) => Constraint::record(
            fields
                .iter()
                .map(|(name, field)| (name.clone(), constraint_of(field))),
        ),
        Value::Array(items) => Constraint::tuple(items.iter().map(constraint_of)),
        Value::Closure(_) | Value::Builtin(_) => Constraint::IsFunction,
        primitive => Constraint::Equals(primitive.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implies::implies;
    use pretty_assertions::assert_eq;

    #[test]
    fn literals_are_exact() {
        assert_eq!(constraint_of(&Value::number(5)), Constraint::equals(5.0));
        assert!(implies(&constraint_of(&Value::string("a")), &Constraint::IsString));
    }

    #[test]
    fn arrays_become_tuples() {
        let c = constraint_of(&Value::array([Value::number(1), Value::string("x")]));
        assert!(implies(&c, &Constraint::length(Constraint::equals(2.0))));
        assert!(implies(&c, &Constraint::element_at(1, Constraint::IsString)));
        assert!(implies(
            &c,
            &Constraint::elements(Constraint::or([Constraint::IsNumber, Constraint::IsString]))
        ));
    }
}
