use rf_core::{Constraint, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: f64,
    pub inclusive: bool,
}

/// A numeric range with optional ends; the meaning of a conjunction of bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lo: Option<Bound>,
    pub hi: Option<Bound>,
}

impl Interval {
    pub fn full() -> Self {
        Self { lo: None, hi: None }
    }

    pub fn point(n: f64) -> Self {
        let bound = Some(Bound {
            value: n,
            inclusive: true,
        });
        Self { lo: bound, hi: bound }
    }

    /// The interval of a single bound or numeric literal.
    pub fn of_atom(c: &Constraint) -> Option<Interval> {
        let bound = |value: f64, inclusive: bool| Some(Bound { value, inclusive });
        match c {
            Constraint::Gt(n) => Some(Self { lo: bound(*n, false), hi: None }),
            Constraint::Gte(n) => Some(Self { lo: bound(*n, true), hi: None }),
            Constraint::Lt(n) => Some(Self { lo: None, hi: bound(*n, false) }),
            Constraint::Lte(n) => Some(Self { lo: None, hi: bound(*n, true) }),
            Constraint::Equals(Value::Number(n)) => Some(Self::point(*n)),
            Constraint::IsNumber => Some(Self::full()),
            _ => None,
        }
    }

    /// Numeric range admitted by `c`; unbounded when nothing is known.
    pub fn of(c: &Constraint) -> Interval {
        match c {
            Constraint::And(items) => items
                .iter()
                .fold(Self::full(), |acc, item| acc.intersect(&Self::of(item))),
            Constraint::Or(items) if !items.is_empty() => items
                .iter()
                .map(Self::of)
                .reduce(|a, b| a.hull(&b))
                .unwrap_or_else(Self::full),
            other => Self::of_atom(other).unwrap_or_else(Self::full),
        }
    }

    pub fn is_full(&self) -> bool {
        self.lo.is_none() && self.hi.is_none()
    }

    pub fn intersect(&self, other: &Interval) -> Interval {
        Interval {
            lo: tighter(self.lo, other.lo, |a, b| a > b),
            hi: tighter(self.hi, other.hi, |a, b| a < b),
        }
    }

    /// Smallest interval containing both.
    pub fn hull(&self, other: &Interval) -> Interval {
        let lo = match (self.lo, other.lo) {
            (Some(a), Some(b)) => Some(looser(a, b, |x, y| x < y)),
            _ => None,
        };
        let hi = match (self.hi, other.hi) {
            (Some(a), Some(b)) => Some(looser(a, b, |x, y| x > y)),
            _ => None,
        };
        Interval { lo, hi }
    }

    pub fn is_empty(&self) -> bool {
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) => {
                lo.value > hi.value || (lo.value == hi.value && !(lo.inclusive && hi.inclusive))
            }
            _ => false,
        }
    }

    pub fn as_point(&self) -> Option<f64> {
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) if lo.value == hi.value && lo.inclusive && hi.inclusive => {
                Some(lo.value)
            }
            _ => None,
        }
    }

    pub fn contains(&self, n: f64) -> bool {
        let above = self
            .lo
            .map_or(true, |b| n > b.value || (b.inclusive && n == b.value));
        let below = self
            .hi
            .map_or(true, |b| n < b.value || (b.inclusive && n == b.value));
        above && below
    }

    /// Every number in `self` is in `other`.
    pub fn is_subset_of(&self, other: &Interval) -> bool {
        if self.is_empty() {
            return true;
        }
        let lo_ok = match (self.lo, other.lo) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a.value > b.value || (a.value == b.value && (b.inclusive || !a.inclusive)),
        };
        let hi_ok = match (self.hi, other.hi) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => a.value < b.value || (a.value == b.value && (b.inclusive || !a.inclusive)),
        };
        lo_ok && hi_ok
    }

    /// Entirely below `other`: every element of `self` is less than every element of `other`.
    pub fn is_below(&self, other: &Interval) -> bool {
        match (self.hi, other.lo) {
            (Some(a), Some(b)) => a.value < b.value || (a.value == b.value && !(a.inclusive && b.inclusive)),
            _ => false,
        }
    }

    pub fn add(&self, other: &Interval) -> Interval {
        let combine = |a: Option<Bound>, b: Option<Bound>| match (a, b) {
            (Some(a), Some(b)) => Some(Bound {
                value: a.value + b.value,
                inclusive: a.inclusive && b.inclusive,
            }),
            _ => None,
        };
        Interval {
            lo: combine(self.lo, other.lo),
            hi: combine(self.hi, other.hi),
        }
    }

    pub fn neg(&self) -> Interval {
        let flip = |b: Option<Bound>| {
            b.map(|b| Bound {
                value: -b.value,
                inclusive: b.inclusive,
            })
        };
        Interval {
            lo: flip(self.hi),
            hi: flip(self.lo),
        }
    }

    pub fn sub(&self, other: &Interval) -> Interval {
        self.add(&other.neg())
    }

    /// Bounds as constraints, without the implied `IsNumber`.
    pub fn to_bounds(&self) -> Vec<Constraint> {
        if let Some(n) = self.as_point() {
            return vec![Constraint::equals(n)];
        }
        let mut out = Vec::new();
        if let Some(lo) = self.lo {
            out.push(if lo.inclusive {
                Constraint::Gte(lo.value)
            } else {
                Constraint::Gt(lo.value)
            });
        }
        if let Some(hi) = self.hi {
            out.push(if hi.inclusive {
                Constraint::Lte(hi.value)
            } else {
                Constraint::Lt(hi.value)
            });
        }
        out
    }

    /// `IsNumber` with these bounds.
    pub fn to_constraint(&self) -> Constraint {
        if self.is_empty() {
            return Constraint::Never;
        }
        if let Some(n) = self.as_point() {
            return Constraint::equals(n);
        }
        let mut items = vec![Constraint::IsNumber];
        items.extend(self.to_bounds());
        if items.len() == 1 {
            Constraint::IsNumber
        } else {
            Constraint::And(items)
        }
    }
}

fn tighter(a: Option<Bound>, b: Option<Bound>, beyond: impl Fn(f64, f64) -> bool) -> Option<Bound> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if beyond(a.value, b.value) {
            a
        } else if beyond(b.value, a.value) {
            b
        } else {
            Bound {
                value: a.value,
                inclusive: a.inclusive && b.inclusive,
            }
        }),
        (a, None) => a,
        (None, b) => b,
    }
}

fn looser(a: Bound, b: Bound, beyond: impl Fn(f64, f64) -> bool) -> Bound {
    if beyond(a.value, b.value) {
        a
    } else if beyond(b.value, a.value) {
        b
    } else {
        Bound {
            value: a.value,
            inclusive: a.inclusive || b.inclusive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bounds_pin_a_point() {
        let c = Constraint::and([Constraint::Gte(3.0), Constraint::Lte(3.0)]);
        assert_eq!(Interval::of(&c).as_point(), Some(3.0));
    }

    #[test]
    fn addition_propagates_bounds() {
        let a = Interval::of(&Constraint::Gt(0.0));
        let b = Interval::point(1.0);
        assert_eq!(a.add(&b).to_bounds(), vec![Constraint::Gt(1.0)]);
    }

    #[test]
    fn strict_bound_is_inside_inclusive() {
        let strict = Interval::of(&Constraint::Gt(5.0));
        let loose = Interval::of(&Constraint::Gte(5.0));
        assert!(strict.is_subset_of(&loose));
        assert!(!loose.is_subset_of(&strict));
    }
}
