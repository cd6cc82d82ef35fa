//! Flow-sensitive refinement: what a condition tells about the variables it
//! mentions in each branch.

use rf_core::ast::{BinOpKind, Expr, ExprKind, UnOpKind};
use rf_core::{Constraint, Value};
use rf_typing::simplify;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Extra constraints per variable name.
pub type Refinements = BTreeMap<String, Constraint>;

/// Immutable map of refinements valid in a lexical scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefinementContext {
    map: Arc<Refinements>,
}

impl RefinementContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Constraint> {
        self.map.get(name)
    }

    /// Conjoin `c` to whatever is already known about `name`.
    pub fn refine(&self, name: &str, c: Constraint) -> Self {
        let mut map = self.map.as_ref().clone();
        let refined = match map.remove(name) {
            Some(existing) => simplify(&Constraint::and([existing, c])),
            None => simplify(&c),
        };
        map.insert(name.to_string(), refined);
        Self { map: Arc::new(map) }
    }

    pub fn refine_all(&self, refinements: &Refinements) -> Self {
        refinements
            .iter()
            .fold(self.clone(), |ctx, (name, c)| ctx.refine(name, c.clone()))
    }

    /// Drop the refinement of a name that is being rebound.
    pub fn without(&self, name: &str) -> Self {
        if !self.map.contains_key(name) {
            return self.clone();
        }
        let mut map = self.map.as_ref().clone();
        map.remove(name);
        Self { map: Arc::new(map) }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Constraint)> {
        self.map.iter()
    }
}

/// Refinements for the branch where a condition holds and the one where it fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Branches {
    pub then: Refinements,
    pub otherwise: Refinements,
}

impl Branches {
    fn swap(self) -> Self {
        Self {
            then: self.otherwise,
            otherwise: self.then,
        }
    }
}

/// The kind tested by a type-guard builtin.
pub fn guard_kind(name: &str) -> Option<Constraint> {
    Some(match name {
        "isNumber" => Constraint::IsNumber,
        "isString" => Constraint::IsString,
        "isBool" => Constraint::IsBool,
        "isNull" => Constraint::IsNull,
        "isObject" => Constraint::IsObject,
        "isArray" => Constraint::IsArray,
        "isFunction" => Constraint::IsFunction,
        _ => return None,
    })
}

/// Analyze `cond`; `known` yields compile-time values of names.
pub fn branches(cond: &Expr, known: &dyn Fn(&str) -> Option<Value>) -> Branches {
    match &cond.kind {
        ExprKind::Binary(b) => match b.op {
            BinOpKind::And => {
                let lhs = branches(&b.lhs, known);
                let rhs = branches(&b.rhs, known);
                Branches {
                    then: merge(lhs.then, rhs.then),
                    otherwise: join(lhs.otherwise, rhs.otherwise),
                }
            }
            BinOpKind::Or => {
                let lhs = branches(&b.lhs, known);
                let rhs = branches(&b.rhs, known);
                Branches {
                    then: join(lhs.then, rhs.then),
                    otherwise: merge(lhs.otherwise, rhs.otherwise),
                }
            }
            op => comparison_branches(op, &b.lhs, &b.rhs, known)
                .or_else(|| comparison_branches(op.flip(), &b.rhs, &b.lhs, known))
                .unwrap_or_default(),
        },
        ExprKind::Unary(u) if u.op == UnOpKind::Not => branches(&u.operand, known).swap(),
        ExprKind::Call(_) => match extract_type_guard(cond) {
            Some((root, kind, path)) => Branches {
                then: single(&root, wrap_path(&path, kind.clone())),
                otherwise: single(&root, wrap_path(&path, Constraint::not(kind))),
            },
            None => Branches::default(),
        },
        _ => match path_of(cond) {
            Some((root, path)) if path.is_empty() && known(&root).is_some() => Branches::default(),
            Some((root, path)) => Branches {
                then: single(&root, wrap_path(&path, Constraint::equals(true))),
                otherwise: single(&root, wrap_path(&path, Constraint::equals(false))),
            },
            None => Branches::default(),
        },
    }
}

/// Refinements valid where `cond` holds.
pub fn extract_refinement(cond: &Expr, known: &dyn Fn(&str) -> Option<Value>) -> Refinements {
    branches(cond, known).then
}

/// Refinements valid where `cond` fails.
pub fn extract_negated_refinement(
    cond: &Expr,
    known: &dyn Fn(&str) -> Option<Value>,
) -> Refinements {
    branches(cond, known).otherwise
}

/// `isNumber(x)`-style guards: the root variable, the tested kind and the
/// field path from the root.
pub fn extract_type_guard(cond: &Expr) -> Option<(String, Constraint, Vec<String>)> {
    let ExprKind::Call(call) = &cond.kind else {
        return None;
    };
    let kind = guard_kind(call.callee.as_var()?)?;
    let [arg] = call.args.as_slice() else {
        return None;
    };
    let (root, path) = path_of(arg)?;
    Some((root, kind, path))
}

fn comparison_branches(
    op: BinOpKind,
    subject: &Expr,
    other: &Expr,
    known: &dyn Fn(&str) -> Option<Value>,
) -> Option<Branches> {
    let (root, path) = path_of(subject)?;
    if path.is_empty() && known(&root).is_some() {
        return None;
    }
    let value = operand_value(other, known)?;
    let (then, otherwise) = comparison(op, value)?;
    Some(Branches {
        then: single(&root, wrap_path(&path, then)),
        otherwise: single(&root, wrap_path(&path, otherwise)),
    })
}

/// The constraints of a comparison holding and failing. A failed ordering
/// also admits NaN, so it stays a negated bound.
fn comparison(op: BinOpKind, value: Value) -> Option<(Constraint, Constraint)> {
    if value.as_number().is_some_and(f64::is_nan) {
        return None;
    }
    let equals = Constraint::equals(value.clone());
    match op {
        BinOpKind::Eq => Some((equals.clone(), Constraint::not(equals))),
        BinOpKind::Ne => Some((Constraint::not(equals.clone()), equals)),
        op if op.is_ordering() => {
            let n = value.as_number()?;
            let holds = match op {
                BinOpKind::Lt => Constraint::Lt(n),
                BinOpKind::Le => Constraint::Lte(n),
                BinOpKind::Gt => Constraint::Gt(n),
                _ => Constraint::Gte(n),
            };
            Some((holds.clone(), Constraint::not(holds)))
        }
        _ => None,
    }
}

fn operand_value(expr: &Expr, known: &dyn Fn(&str) -> Option<Value>) -> Option<Value> {
    match &expr.kind {
        ExprKind::Literal(l) => Some(l.to_value()),
        ExprKind::Value(v) => Some(v.as_ref().clone()),
        ExprKind::Var(name) => known(name).filter(|v| !v.is_compound()),
        ExprKind::Unary(u) if u.op == UnOpKind::Neg => match operand_value(&u.operand, known)? {
            Value::Number(n) => Some(Value::Number(-n)),
            _ => None,
        },
        _ => None,
    }
}

/// `a.b.c` as root `a` and path `[b, c]`.
fn path_of(expr: &Expr) -> Option<(String, Vec<String>)> {
    match &expr.kind {
        ExprKind::Var(name) => Some((name.clone(), Vec::new())),
        ExprKind::Field(field) => {
            let (root, mut path) = path_of(&field.object)?;
            path.push(field.name.clone());
            Some((root, path))
        }
        _ => None,
    }
}

fn wrap_path(path: &[String], c: Constraint) -> Constraint {
    path.iter()
        .rev()
        .fold(c, |inner, name| Constraint::has_field(name.clone(), inner))
}

fn single(root: &str, c: Constraint) -> Refinements {
    Refinements::from([(root.to_string(), c)])
}

/// Both hold: conjoin per variable.
fn merge(mut a: Refinements, b: Refinements) -> Refinements {
    for (name, c) in b {
        let merged = match a.remove(&name) {
            Some(existing) => simplify(&Constraint::and([existing, c])),
            None => c,
        };
        a.insert(name, merged);
    }
    a
}

/// Either holds: only variables refined on both sides survive.
fn join(a: Refinements, mut b: Refinements) -> Refinements {
    a.into_iter()
        .filter_map(|(name, c)| {
            let other = b.remove(&name)?;
            Some((name, simplify(&Constraint::or([c, other]))))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rf_core::ast::build::*;

    fn nothing(_: &str) -> Option<Value> {
        None
    }

    #[test]
    fn literal_on_the_left_flips_the_comparison() {
        let b = branches(&lt(num(0.0), var("x")), &nothing);
        assert_eq!(b.then.get("x"), Some(&Constraint::Gt(0.0)));
        assert_eq!(
            b.otherwise.get("x"),
            Some(&Constraint::not(Constraint::Gt(0.0)))
        );
    }

    #[test]
    fn comparisons_with_nan_refine_nothing() {
        let known = |name: &str| (name == "nan").then(|| Value::number(f64::NAN));
        let b = branches(&eq(var("x"), var("nan")), &known);
        assert!(b.then.is_empty());
        assert!(b.otherwise.is_empty());
    }

    #[test]
    fn disjunction_keeps_only_shared_variables() {
        let cond = or(gt(var("x"), num(10.0)), eq(var("y"), num(1.0)));
        assert!(branches(&cond, &nothing).then.is_empty());
        let cond = or(gt(var("x"), num(10.0)), lt(var("x"), num(0.0)));
        assert_eq!(branches(&cond, &nothing).then.len(), 1);
    }

    #[test]
    fn field_paths_nest() {
        let cond = eq(field(var("shape"), "kind"), string("circle"));
        let then = extract_refinement(&cond, &nothing);
        assert_eq!(
            then.get("shape"),
            Some(&Constraint::has_field("kind", Constraint::equals("circle")))
        );
    }

    #[test]
    fn known_names_act_as_literals() {
        let known = |name: &str| (name == "limit").then(|| Value::number(3));
        let then = extract_refinement(&le(var("n"), var("limit")), &known);
        assert_eq!(then.get("n"), Some(&Constraint::Lte(3.0)));
    }
}
