//! Binding of unification variables in builtin signatures.

use crate::project::{element_at_constraint, element_constraint, field_constraint, length_constraint};
use crate::simplify::simplify;
use rf_core::Constraint;
use std::collections::BTreeMap;

/// Solutions for `Var`s collected from argument constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    vars: BTreeMap<u32, Constraint>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match `pattern` against `actual`, widening earlier solutions.
    pub fn bind(&mut self, pattern: &Constraint, actual: &Constraint) {
        match pattern {
            Constraint::Var(id) => {
                let solution = match self.vars.remove(id) {
                    Some(existing) => simplify(&Constraint::or([existing, actual.clone()])),
                    None => simplify(actual),
                };
                self.vars.insert(*id, solution);
            }
            Constraint::And(items) => items.iter().for_each(|item| self.bind(item, actual)),
            Constraint::HasField(name, inner) => self.bind(inner, &field_constraint(actual, name)),
            Constraint::Elements(inner) => self.bind(inner, &element_constraint(actual)),
            Constraint::ElementAt(index, inner) => {
                self.bind(inner, &element_at_constraint(actual, *index))
            }
            Constraint::Length(inner) => self.bind(inner, &length_constraint(actual)),
            _ => {}
        }
    }

    pub fn get(&self, id: u32) -> Option<&Constraint> {
        self.vars.get(&id)
    }

    /// Replace solved variables; unsolved ones become `Any`.
    pub fn instantiate(&self, pattern: &Constraint) -> Constraint {
        simplify(&self.substitute(pattern))
    }

    fn substitute(&self, pattern: &Constraint) -> Constraint {
        match pattern {
            Constraint::Var(id) => self.vars.get(id).cloned().unwrap_or(Constraint::Any),
            other => other.map_children(|child| self.substitute(child)),
        }
    }
}

pub fn has_vars(c: &Constraint) -> bool {
    c.any_node(&mut |node| matches!(node, Constraint::Var(_)))
}

/// The pattern with every variable widened to `Any`.
pub fn erase_vars(c: &Constraint) -> Constraint {
    Bindings::new().instantiate(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn element_variable_binds_from_tuple() {
        let pattern = Constraint::and([Constraint::IsArray, Constraint::elements(Constraint::Var(0))]);
        let actual = Constraint::tuple([Constraint::equals(1.0), Constraint::equals(2.0)]);
        let mut bindings = Bindings::new();
        bindings.bind(&pattern, &actual);
        let element = bindings.get(0).cloned().unwrap_or(Constraint::Never);
        assert!(crate::implies(&element, &Constraint::IsNumber));
        assert_eq!(
            bindings.instantiate(&Constraint::Var(1)),
            Constraint::Any
        );
    }
}
