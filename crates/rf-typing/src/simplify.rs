//! Canonical form for constraints.
//!
//! Conjunctions and disjunctions are flattened, de-duplicated and sorted;
//! contradictions collapse to `Never`. A conjunction containing a
//! disjunction is distributed (up to a bound) so that contradictory branches
//! drop out, which is what narrows discriminated unions.

use crate::check::satisfies;
use crate::implies::implies_simplified;
use crate::interval::Interval;
use crate::rec::{mentions_var, shift, unfold};
use itertools::Itertools;
use rf_core::{BaseKind, Constraint, Value};
use std::collections::BTreeMap;

/// Upper bound on the number of branches produced by distributing AND over OR.
const MAX_DISTRIBUTION: usize = 32;

pub fn simplify(c: &Constraint) -> Constraint {
    match c {
        Constraint::And(items) => simplify_and(items.iter().map(simplify).collect(), true),
        Constraint::Or(items) => simplify_or(items.iter().map(simplify).collect()),
        Constraint::Not(inner) => negate(simplify(inner)),
        Constraint::HasField(name, inner) => match simplify(inner) {
            Constraint::Never => Constraint::Never,
            inner => Constraint::has_field(name.clone(), inner),
        },
        Constraint::ElementAt(index, inner) => match simplify(inner) {
            Constraint::Never => Constraint::Never,
            inner => Constraint::element_at(*index, inner),
        },
        Constraint::Elements(inner) => Constraint::elements(simplify(inner)),
        Constraint::Length(inner) => simplify_length(simplify(inner)),
        Constraint::Rec(body) => simplify_rec(simplify(body)),
        Constraint::Gt(n) | Constraint::Gte(n) | Constraint::Lt(n) | Constraint::Lte(n)
            if n.is_nan() =>
        {
            Constraint::Never
        }
        other => other.clone(),
    }
}

fn negate(inner: Constraint) -> Constraint {
    match inner {
        Constraint::Not(x) => *x,
        Constraint::Any => Constraint::Never,
        Constraint::Never => Constraint::Any,
        other => Constraint::not(other),
    }
}

fn simplify_length(inner: Constraint) -> Constraint {
    if inner.is_never() {
        return Constraint::Never;
    }
    let lengths = simplify_and(
        vec![inner.clone(), Constraint::IsNumber, Constraint::Gte(0.0)],
        false,
    );
    if lengths.is_never() {
        Constraint::Never
    } else {
        Constraint::length(inner)
    }
}

fn simplify_rec(body: Constraint) -> Constraint {
    if body.is_never() {
        return Constraint::Never;
    }
    if !mentions_var(&body, 0) {
        return shift(&body, -1, 0);
    }
    Constraint::Rec(Box::new(body))
}

/// Every occurrence of the binder sits under a field or element constructor.
fn is_guarded(c: &Constraint, depth: usize) -> bool {
    match c {
        Constraint::RecVar(i) => *i != depth,
        Constraint::HasField(..)
        | Constraint::Elements(_)
        | Constraint::ElementAt(..)
        | Constraint::Length(_) => true,
        Constraint::Rec(body) => is_guarded(body, depth + 1),
        other => other.children().into_iter().all(|child| is_guarded(child, depth)),
    }
}

fn push_unique(out: &mut Vec<Constraint>, c: Constraint) {
    if !out.contains(&c) {
        out.push(c);
    }
}

fn flatten_and(items: Vec<Constraint>, out: &mut Vec<Constraint>) {
    for item in items {
        match item {
            Constraint::And(inner) => flatten_and(inner, out),
            Constraint::Any => {}
            other => push_unique(out, other),
        }
    }
}

fn flatten_or(items: Vec<Constraint>, out: &mut Vec<Constraint>) {
    for item in items {
        match item {
            Constraint::Or(inner) => flatten_or(inner, out),
            Constraint::Never => {}
            other => push_unique(out, other),
        }
    }
}

fn finish(items: Vec<Constraint>, empty: Constraint, wrap: fn(Vec<Constraint>) -> Constraint) -> Constraint {
    let mut items: Vec<Constraint> = items
        .into_iter()
        .sorted_by(|a, b| a.canonical_cmp(b))
        .dedup()
        .collect();
    match items.len() {
        0 => empty,
        1 => items.remove(0),
        _ => wrap(items),
    }
}

/// Conjunction of already simplified constraints.
pub(crate) fn simplify_and(items: Vec<Constraint>, allow_unfold: bool) -> Constraint {
    let mut flat = Vec::new();
    flatten_and(items, &mut flat);
    if flat.iter().any(Constraint::is_never) {
        return Constraint::Never;
    }
    if flat.len() <= 1 {
        return finish(flat, Constraint::Any, Constraint::And);
    }

    // A recursive constraint meeting other information is unrolled once so
    // its union can be narrowed.
    let unfoldable = |c: &Constraint| matches!(c, Constraint::Rec(body) if is_guarded(body, 0));
    if allow_unfold && flat.iter().any(unfoldable) {
        let unrolled = flat
            .into_iter()
            .map(|c| if unfoldable(&c) { simplify(&unfold(&c)) } else { c })
            .collect();
        return simplify_and(unrolled, false);
    }

    if let Some(distributed) = distribute(&flat, allow_unfold) {
        return distributed;
    }

    let Some(mut items) = merge_structure(flat, allow_unfold) else {
        return Constraint::Never;
    };

    let mut kind: Option<BaseKind> = None;
    for item in &items {
        if let Some(k) = item.kind_hint() {
            kind = match kind {
                None => Some(k),
                Some(prev) => match prev.meet(k) {
                    Some(meet) => Some(meet),
                    None => return Constraint::Never,
                },
            };
        }
    }

    if kind == Some(BaseKind::Number) {
        match collapse_bounds(items) {
            Some(collapsed) => items = collapsed,
            None => return Constraint::Never,
        }
    }

    let literals: Vec<&Value> = items.iter().filter_map(Constraint::literal).collect();
    if let Some(first) = literals.first() {
        if literals.iter().any(|v| v != first) {
            return Constraint::Never;
        }
        let literal = (*first).clone();
        let mut kept = vec![Constraint::Equals(literal.clone())];
        for item in &items {
            match item {
                Constraint::Equals(_) => {}
                Constraint::Var(_) | Constraint::RecVar(_) | Constraint::RecRef(_) => {
                    kept.push(item.clone())
                }
                other if !satisfies(&literal, other) => return Constraint::Never,
                _ => {}
            }
        }
        return finish(kept, Constraint::Any, Constraint::And);
    }

    let Some(items) = resolve_negations(items) else {
        return Constraint::Never;
    };

    // One base kind stands for everything the other conjuncts imply about kind.
    let mut out: Vec<Constraint> = items.into_iter().filter(|c| !c.is_base_kind()).collect();
    if let Some(kind) = kind {
        out.push(kind.constraint());
    }
    finish(out, Constraint::Any, Constraint::And)
}

/// Distribute the conjunction over its disjunctions when the product is small.
fn distribute(flat: &[Constraint], allow_unfold: bool) -> Option<Constraint> {
    let (ors, rest): (Vec<&Constraint>, Vec<&Constraint>) =
        flat.iter().partition(|c| matches!(c, Constraint::Or(_)));
    if ors.is_empty() {
        return None;
    }
    let product = ors.iter().try_fold(1usize, |acc, c| match c {
        Constraint::Or(branches) => acc.checked_mul(branches.len()),
        _ => Some(acc),
    })?;
    if product > MAX_DISTRIBUTION {
        return None;
    }

    let mut combos: Vec<Vec<Constraint>> = vec![rest.into_iter().cloned().collect()];
    for or in ors {
        let Constraint::Or(branches) = or else {
            continue;
        };
        combos = combos
            .into_iter()
            .flat_map(|combo| {
                branches.iter().map(move |branch| {
                    let mut next = combo.clone();
                    next.push(branch.clone());
                    next
                })
            })
            .collect();
    }
    let branches = combos
        .into_iter()
        .map(|combo| simplify_and(combo, allow_unfold))
        .collect();
    Some(simplify_or(branches))
}

/// Merge same-field and same-index constraints; `None` on contradiction.
fn merge_structure(flat: Vec<Constraint>, allow_unfold: bool) -> Option<Vec<Constraint>> {
    let mut fields: Vec<(String, Vec<Constraint>)> = Vec::new();
    let mut positions: BTreeMap<usize, Vec<Constraint>> = BTreeMap::new();
    let mut elements: Vec<Constraint> = Vec::new();
    let mut lengths: Vec<Constraint> = Vec::new();
    let mut out = Vec::new();

    for item in flat {
        match item {
            Constraint::HasField(name, inner) => {
                match fields.iter_mut().find(|(n, _)| *n == name) {
                    Some((_, list)) => list.push(*inner),
                    None => fields.push((name, vec![*inner])),
                }
            }
            Constraint::ElementAt(index, inner) => positions.entry(index).or_default().push(*inner),
            Constraint::Elements(inner) => elements.push(*inner),
            Constraint::Length(inner) => lengths.push(*inner),
            other => out.push(other),
        }
    }

    let conjoin = |mut list: Vec<Constraint>| {
        if list.len() == 1 {
            list.remove(0)
        } else {
            simplify_and(list, allow_unfold)
        }
    };

    for (name, list) in fields {
        let inner = conjoin(list);
        if inner.is_never() {
            return None;
        }
        out.push(Constraint::has_field(name, inner));
    }

    let element = (!elements.is_empty()).then(|| conjoin(elements));
    if let Some(element) = &element {
        out.push(Constraint::elements(element.clone()));
    }

    let max_index = positions.keys().next_back().copied();
    for (index, mut list) in positions {
        if let Some(element) = &element {
            list.push(element.clone());
        }
        let inner = conjoin(list);
        if inner.is_never() {
            return None;
        }
        out.push(Constraint::element_at(index, inner));
    }

    if !lengths.is_empty() {
        let length = conjoin(lengths);
        if length.is_never() {
            return None;
        }
        if let Some(max_index) = max_index {
            let long_enough = simplify_and(
                vec![length.clone(), Constraint::IsNumber, Constraint::Gt(max_index as f64)],
                false,
            );
            if long_enough.is_never() {
                return None;
            }
        }
        out.push(Constraint::length(length));
    }
    Some(out)
}

/// Numeric conjunction: all bounds collapse to the tightest pair. NaN
/// satisfies no bound, so a negated bound admits it: negated bounds become
/// complementary bounds only next to a positive bound. `None` on an empty
/// range.
fn collapse_bounds(items: Vec<Constraint>) -> Option<Vec<Constraint>> {
    let mut interval = Interval::full();
    let mut bounded = false;
    let mut negated = Vec::new();
    let mut excluded = Vec::new();
    let mut rest = Vec::new();
    for item in items {
        if item.is_numeric_bound() {
            if let Some(atom) = Interval::of_atom(&item) {
                interval = interval.intersect(&atom);
            }
            bounded = true;
            continue;
        }
        match item {
            Constraint::Not(inner) => match *inner {
                bound if bound.is_numeric_bound() => negated.push(bound),
                Constraint::Equals(Value::Number(n)) => excluded.push(n),
                other => rest.push(Constraint::not(other)),
            },
            other => rest.push(other),
        }
    }
    if bounded {
        for bound in &negated {
            if let Some(atom) = complement(bound).and_then(|c| Interval::of_atom(&c)) {
                interval = interval.intersect(&atom);
            }
        }
    } else {
        rest.extend(negated.into_iter().map(Constraint::not));
    }

    // Excluding an inclusive endpoint makes it strict.
    excluded.retain(|n| {
        let mut absorbed = false;
        if let Some(lo) = interval.lo.as_mut() {
            if lo.inclusive && lo.value == *n {
                lo.inclusive = false;
                absorbed = true;
            }
        }
        if let Some(hi) = interval.hi.as_mut() {
            if hi.inclusive && hi.value == *n {
                hi.inclusive = false;
                absorbed = true;
            }
        }
        !absorbed && interval.contains(*n)
    });

    if interval.is_empty() {
        return None;
    }
    rest.extend(interval.to_bounds());
    rest.extend(
        excluded
            .into_iter()
            .map(|n| Constraint::not(Constraint::equals(n))),
    );
    Some(rest)
}

/// The bound holding for every non-NaN number failing `bound`.
fn complement(bound: &Constraint) -> Option<Constraint> {
    Some(match bound {
        Constraint::Gt(n) => Constraint::Lte(*n),
        Constraint::Gte(n) => Constraint::Lt(*n),
        Constraint::Lt(n) => Constraint::Gte(*n),
        Constraint::Lte(n) => Constraint::Gt(*n),
        _ => return None,
    })
}

/// `Not(X)` next to conjuncts implying `X` is a contradiction; next to
/// conjuncts disjoint from `X` it is redundant.
fn resolve_negations(items: Vec<Constraint>) -> Option<Vec<Constraint>> {
    let positive: Vec<Constraint> = items
        .iter()
        .filter(|c| !matches!(c, Constraint::Not(_)))
        .cloned()
        .collect();
    if positive.is_empty() || positive.len() == items.len() {
        return Some(items);
    }
    let context = simplify_and(positive, false);
    let mut out = Vec::new();
    for item in items {
        if let Constraint::Not(excluded) = &item {
            if implies_simplified(&context, excluded) {
                return None;
            }
            if simplify_and(vec![context.clone(), excluded.as_ref().clone()], false).is_never() {
                continue;
            }
        }
        out.push(item);
    }
    Some(out)
}

/// Disjunction of already simplified constraints.
pub(crate) fn simplify_or(items: Vec<Constraint>) -> Constraint {
    let mut flat = Vec::new();
    flatten_or(items, &mut flat);
    if flat.iter().any(Constraint::is_any) {
        return Constraint::Any;
    }
    let has_true = flat.contains(&Constraint::equals(true));
    let has_false = flat.contains(&Constraint::equals(false));
    if has_true && has_false {
        flat.retain(|c| *c != Constraint::equals(true) && *c != Constraint::equals(false));
        push_unique(&mut flat, Constraint::IsBool);
    }

    let mut kept: Vec<Constraint> = Vec::new();
    for (i, item) in flat.iter().enumerate() {
        let subsumed = flat.iter().enumerate().any(|(j, other)| {
            i != j
                && implies_simplified(item, other)
                && (j < i || !implies_simplified(other, item))
        });
        if !subsumed {
            kept.push(item.clone());
        }
    }
    finish(kept, Constraint::Never, Constraint::Or)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn point_interval_becomes_literal() {
        let c = Constraint::and([Constraint::IsNumber, Constraint::Gte(3.0), Constraint::Lte(3.0)]);
        assert_eq!(simplify(&c), Constraint::equals(3.0));
    }

    #[test]
    fn negated_bounds_complement_next_to_a_bound() {
        let c = Constraint::and([Constraint::Gte(0.0), Constraint::not(Constraint::Gt(5.0))]);
        assert_eq!(
            simplify(&c),
            Constraint::and([Constraint::IsNumber, Constraint::Gte(0.0), Constraint::Lte(5.0)])
        );
    }

    #[test]
    fn negated_bounds_alone_still_admit_nan() {
        let c = Constraint::and([Constraint::IsNumber, Constraint::not(Constraint::Gt(5.0))]);
        let simplified = simplify(&c);
        assert!(!implies_simplified(&simplified, &Constraint::Lte(5.0)));
        assert!(satisfies(&Value::number(f64::NAN), &simplified));

        let neither = Constraint::and([
            Constraint::IsNumber,
            Constraint::not(Constraint::Gt(0.0)),
            Constraint::not(Constraint::Lte(0.0)),
        ]);
        assert!(!simplify(&neither).is_never());
    }

    #[test]
    fn excluded_endpoint_becomes_strict() {
        let c = Constraint::and([Constraint::Gte(0.0), Constraint::not(Constraint::equals(0.0))]);
        assert_eq!(
            simplify(&c),
            Constraint::and([Constraint::IsNumber, Constraint::Gt(0.0)])
        );
    }

    #[test]
    fn element_beyond_length_is_never() {
        let c = Constraint::and([
            Constraint::length(Constraint::equals(2.0)),
            Constraint::element_at(5, Constraint::IsNumber),
        ]);
        assert_eq!(simplify(&c), Constraint::Never);
    }

    #[test]
    fn booleans_rejoin() {
        let c = Constraint::or([Constraint::equals(true), Constraint::equals(false)]);
        assert_eq!(simplify(&c), Constraint::IsBool);
    }
}
