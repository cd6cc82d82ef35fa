use crate::implies::implies;
use crate::rec::unfold;
use crate::simplify::simplify;
use rf_core::Constraint;

/// The conjunction of both, simplified; `Never` signals incompatibility.
pub fn unify(a: &Constraint, b: &Constraint) -> Constraint {
    simplify(&Constraint::and([a.clone(), b.clone()]))
}

/// No value satisfies both.
pub fn disjoint(a: &Constraint, b: &Constraint) -> bool {
    unify(a, b).is_never()
}

fn branches(c: &Constraint) -> Vec<Constraint> {
    match simplify(c) {
        Constraint::Or(items) => items,
        rec @ Constraint::Rec(_) => match simplify(&unfold(&rec)) {
            Constraint::Or(items) => items,
            other => vec![other],
        },
        other => vec![other],
    }
}

/// Keep the branches of a union that may satisfy `filter`.
pub fn narrow_or(union: &Constraint, filter: &Constraint) -> Constraint {
    simplify(&Constraint::Or(
        branches(union)
            .into_iter()
            .filter(|branch| !disjoint(branch, filter))
            .collect(),
    ))
}

/// Drop the branches of a union that certainly satisfy `c`.
pub fn exclude(union: &Constraint, c: &Constraint) -> Constraint {
    simplify(&Constraint::Or(
        branches(union)
            .into_iter()
            .filter(|branch| !implies(branch, c))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn narrowing_keeps_compatible_branches() {
        let union = Constraint::or([Constraint::IsNumber, Constraint::IsString]);
        assert_eq!(narrow_or(&union, &Constraint::IsNumber), Constraint::IsNumber);
        assert_eq!(exclude(&union, &Constraint::IsNumber), Constraint::IsString);
        assert_eq!(narrow_or(&union, &Constraint::IsBool), Constraint::Never);
    }
}
