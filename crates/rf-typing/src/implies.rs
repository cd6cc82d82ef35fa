use crate::check::satisfies;
use crate::interval::Interval;
use crate::rec::unfold;
use crate::simplify::{simplify, simplify_and};
use crate::unify::disjoint;
use rf_core::{Constraint, Value};
use tracing::trace;

/// Bound on simultaneously assumed `rec` pairs.
const MAX_ASSUMPTIONS: usize = 64;

/// Every value satisfying `a` satisfies `b`.
///
/// Sound but incomplete: `false` means "not provable".
pub fn implies(a: &Constraint, b: &Constraint) -> bool {
    implies_simplified(&simplify(a), &simplify(b))
}

/// `implies` for inputs already in canonical form.
pub fn implies_simplified(a: &Constraint, b: &Constraint) -> bool {
    Implication::default().check(a, b)
}

#[derive(Default)]
struct Implication {
    /// Pairs under consideration; meeting one again closes the cycle.
    assumptions: Vec<(Constraint, Constraint)>,
}

impl Implication {
    fn check(&mut self, a: &Constraint, b: &Constraint) -> bool {
        if a == b {
            return true;
        }
        match (a, b) {
            (Constraint::Never, _) | (_, Constraint::Any) => true,
            (_, Constraint::Never) => false,
            (Constraint::Or(xs), _) => xs.iter().all(|x| self.check(x, b)),
            (_, Constraint::And(ys)) => ys.iter().all(|y| self.check(a, y)),
            (Constraint::Equals(v), _) => satisfies(v, b),
            (Constraint::Rec(_), _) | (_, Constraint::Rec(_)) => self.assume(a, b),
            (_, Constraint::Or(ys)) => ys.iter().any(|y| self.check(a, y)),
            (Constraint::And(xs), _) => {
                xs.iter().any(|x| self.check(x, b)) || self.conjunction_implies(xs, b)
            }
            (Constraint::Not(x), Constraint::Not(y)) => self.check(y, x),
            (_, Constraint::Not(y)) => disjoint(a, y),
            (Constraint::Any, _) | (Constraint::Not(_), _) => false,
            _ => self.atom(a, b),
        }
    }

    fn assume(&mut self, a: &Constraint, b: &Constraint) -> bool {
        if self.assumptions.iter().any(|(x, y)| x == a && y == b) {
            return true;
        }
        if self.assumptions.len() >= MAX_ASSUMPTIONS {
            trace!("rec assumption limit reached comparing {} with {}", a, b);
            return false;
        }
        self.assumptions.push((a.clone(), b.clone()));
        let a_unrolled = match a {
            Constraint::Rec(_) => simplify(&unfold(a)),
            other => other.clone(),
        };
        let b_unrolled = match b {
            Constraint::Rec(_) => simplify(&unfold(b)),
            other => other.clone(),
        };
        let result = self.check(&a_unrolled, &b_unrolled);
        self.assumptions.pop();
        result
    }

    fn atom(&mut self, a: &Constraint, b: &Constraint) -> bool {
        if b.is_base_kind() {
            return match (a.kind_hint(), b.kind_hint()) {
                (Some(have), Some(want)) => have.refines(want),
                _ => false,
            };
        }
        match (a, b) {
            (Constraint::HasField(m, c), Constraint::HasField(n, d)) => m == n && self.check(c, d),
            (Constraint::Elements(c), Constraint::Elements(d)) => self.check(c, d),
            (Constraint::Length(c), Constraint::Length(d)) => self.check(c, d),
            (Constraint::ElementAt(i, c), Constraint::ElementAt(j, d)) => {
                i == j && self.check(c, d)
            }
            _ if is_numeric(b) && a.is_numeric_bound() => {
                match (Interval::of_atom(a), Interval::of_atom(b)) {
                    (Some(have), Some(want)) => have.is_subset_of(&want),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Facts that only follow from several conjuncts together.
    fn conjunction_implies(&mut self, xs: &[Constraint], b: &Constraint) -> bool {
        match b {
            _ if is_numeric(b) => {
                let numeric = xs.iter().any(|x| x.kind_hint() == Some(rf_core::BaseKind::Number));
                let want = Interval::of_atom(b);
                numeric
                    && want.is_some_and(|want| {
                        Interval::of(&Constraint::And(xs.to_vec())).is_subset_of(&want)
                    })
            }
            Constraint::Elements(d) => {
                let Some(len) = tuple_length(xs) else {
                    return false;
                };
                (0..len).all(|index| {
                    xs.iter().any(|x| match x {
                        Constraint::ElementAt(i, c) if *i == index => self.check(c, d),
                        _ => false,
                    })
                })
            }
            Constraint::ElementAt(index, d) => {
                let mut parts: Vec<Constraint> = xs
                    .iter()
                    .filter_map(|x| match x {
                        Constraint::ElementAt(i, c) if i == index => Some(c.as_ref().clone()),
                        Constraint::Elements(c) => Some(c.as_ref().clone()),
                        _ => None,
                    })
                    .collect();
                if parts.len() < 2 {
                    return false;
                }
                parts.retain(|p| !p.is_any());
                let merged = simplify_and(parts, false);
                self.check(&merged, d)
            }
            Constraint::Length(d) => {
                let mut parts = vec![Constraint::IsNumber, Constraint::Gte(0.0)];
                for x in xs {
                    match x {
                        Constraint::Length(c) => parts.push(c.as_ref().clone()),
                        Constraint::ElementAt(i, _) => parts.push(Constraint::Gt(*i as f64)),
                        _ => {}
                    }
                }
                let merged = simplify_and(parts, false);
                self.check(&merged, d)
            }
            _ => false,
        }
    }
}

fn is_numeric(c: &Constraint) -> bool {
    c.is_numeric_bound() || matches!(c, Constraint::Equals(Value::Number(_)))
}

fn tuple_length(xs: &[Constraint]) -> Option<usize> {
    xs.iter().find_map(|x| match x {
        Constraint::Length(inner) => match inner.as_ref() {
            Constraint::Equals(Value::Number(n)) if *n >= 0.0 => Some(*n as usize),
            _ => None,
        },
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_bounds_chain() {
        assert!(implies(&Constraint::Gt(5.0), &Constraint::Gt(3.0)));
        assert!(implies(&Constraint::Gt(5.0), &Constraint::Gte(5.0)));
        assert!(!implies(&Constraint::Gte(5.0), &Constraint::Gt(5.0)));
        assert!(implies(&Constraint::Lt(0.0), &Constraint::IsNumber));
    }

    #[test]
    fn pinned_bounds_imply_equality() {
        let pinned = Constraint::and([Constraint::Gte(2.0), Constraint::Lte(2.0)]);
        assert!(implies(&pinned, &Constraint::equals(2.0)));
    }

    #[test]
    fn negation_contrapositive() {
        let not_number = Constraint::not(Constraint::IsNumber);
        let not_positive = Constraint::not(Constraint::Gt(0.0));
        assert!(implies(&not_number, &not_positive));
        assert!(implies(&Constraint::IsString, &not_number));
    }
}
