//! De Bruijn bookkeeping for recursive constraints.

use rf_core::Constraint;

/// Shift free `RecVar`s at or above `cutoff` by `by`.
pub fn shift(c: &Constraint, by: isize, cutoff: usize) -> Constraint {
    match c {
        Constraint::RecVar(i) if *i >= cutoff => {
            Constraint::RecVar((*i as isize + by).max(0) as usize)
        }
        Constraint::Rec(body) => Constraint::Rec(Box::new(shift(body, by, cutoff + 1))),
        other => other.map_children(|child| shift(child, by, cutoff)),
    }
}

/// Replace `RecVar(depth)` with `replacement`, removing that binder.
fn substitute(c: &Constraint, depth: usize, replacement: &Constraint) -> Constraint {
    match c {
        Constraint::RecVar(i) if *i == depth => shift(replacement, depth as isize, 0),
        Constraint::RecVar(i) if *i > depth => Constraint::RecVar(i - 1),
        Constraint::Rec(body) => {
            Constraint::Rec(Box::new(substitute(body, depth + 1, replacement)))
        }
        other => other.map_children(|child| substitute(child, depth, replacement)),
    }
}

/// One step of unrolling: `rec T. body` becomes `body[T := rec T. body]`.
pub fn unfold(c: &Constraint) -> Constraint {
    match c {
        Constraint::Rec(body) => substitute(body, 0, c),
        other => other.clone(),
    }
}

/// Whether `RecVar(depth)` (relative to the current binder) occurs.
pub fn mentions_var(c: &Constraint, depth: usize) -> bool {
    match c {
        Constraint::RecVar(i) => *i == depth,
        Constraint::Rec(body) => mentions_var(body, depth + 1),
        other => other.children().into_iter().any(|child| mentions_var(child, depth)),
    }
}

/// Whether any `RecVar` escapes its binders.
pub fn has_free_vars(c: &Constraint) -> bool {
    fn free_at(c: &Constraint, depth: usize) -> bool {
        match c {
            Constraint::RecVar(i) => *i >= depth,
            Constraint::Rec(body) => free_at(body, depth + 1),
            other => other.children().into_iter().any(|child| free_at(child, depth)),
        }
    }
    free_at(c, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unfold_replaces_the_bound_variable() {
        let list = Constraint::rec(
            "L",
            Constraint::or([
                Constraint::IsNull,
                Constraint::has_field("tail", Constraint::rec_ref("L")),
            ]),
        );
        let unfolded = unfold(&list);
        assert_eq!(
            unfolded,
            Constraint::or([Constraint::IsNull, Constraint::has_field("tail", list.clone())])
        );
        assert!(!has_free_vars(&unfolded));
    }
}
