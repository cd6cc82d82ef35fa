use super::ops::require;
use super::{Scope, Stager};
use crate::operators;
use crate::refine::{branches, Branches, Refinements};
use crate::svalue::{refine_svalue, SValue};
use rf_core::ast::{
    BinOpKind, Expr, ExprBinary, ExprIf, ExprKind, ExprMatch, Literal, MatchCase, Pattern, PatternArray,
    PatternField, PatternType,
};
use rf_core::{type_bail, Constraint, Result, Value};
use rf_optimize::is_pure;
use rf_typing::{disjoint, exclude, implies, simplify};
use tracing::debug;

/// Source name of the staged match subject; not a valid identifier.
const MATCH_SUBJECT: &str = "#match";

impl Stager {
    /// Refinements a condition implies in `scope`.
    pub(super) fn condition_branches(&self, cond: &Expr, scope: &Scope) -> Branches {
        let known = |name: &str| scope.get(name).and_then(|v| v.as_value().cloned());
        branches(cond, &known)
    }

    /// `scope` narrowed by `refinements`; `None` when a refined variable
    /// can no longer hold any value.
    pub(super) fn refined_scope(
        &mut self,
        scope: &Scope,
        refinements: &Refinements,
        at: &Expr,
    ) -> Option<Scope> {
        let refined = scope.refine(refinements);
        for name in refinements.keys() {
            let Some(value) = refined.get(name) else {
                continue;
            };
            if value.constraint().is_never() {
                if self.options.warn_unreachable {
                    self.warn(
                        format!("unreachable branch: `{}` cannot satisfy `{}`", name, at),
                        at.span,
                    );
                }
                return None;
            }
        }
        Some(refined)
    }

    pub(super) fn stage_if(&mut self, i: &ExprIf, scope: &Scope) -> Result<SValue> {
        let cond = self.stage(&i.cond, scope)?;
        if let Some(value) = cond.as_value() {
            let branch = if operators::condition(value)? {
                &i.then
            } else {
                &i.otherwise
            };
            return self.stage(branch, scope);
        }
        let c = cond.constraint();
        require(&c, &Constraint::IsBool, "`if` condition")?;
        let cond_residual = self.residualize(&cond, scope)?;
        let Branches { then, otherwise } = self.condition_branches(&i.cond, scope);

        let decided = c.literal().and_then(Value::as_bool);
        let then_scope = match decided {
            Some(false) => None,
            _ => self.refined_scope(scope, &then, &i.cond),
        };
        let else_scope = match decided {
            Some(true) => None,
            _ => self.refined_scope(scope, &otherwise, &i.cond),
        };
        match (then_scope, else_scope) {
            (Some(then_scope), Some(else_scope)) => {
                let then_value = self.in_branch(true, |s| s.stage(&i.then, &then_scope))?;
                let else_value = self.in_branch(true, |s| s.stage(&i.otherwise, &else_scope))?;
                let constraint =
                    simplify(&Constraint::or([then_value.constraint(), else_value.constraint()]));
                let residual = Expr::new(ExprKind::If(ExprIf {
                    cond: Box::new(cond_residual),
                    then: Box::new(self.residualize(&then_value, &then_scope)?),
                    otherwise: Box::new(self.residualize(&else_value, &else_scope)?),
                }));
                Ok(SValue::later(constraint, residual))
            }
            (Some(then_scope), None) => {
                let value = self.stage(&i.then, &then_scope)?;
                self.keep_effects(cond_residual, value, &then_scope)
            }
            (None, Some(else_scope)) => {
                let value = self.stage(&i.otherwise, &else_scope)?;
                self.keep_effects(cond_residual, value, &else_scope)
            }
            (None, None) => {
                debug!("both branches of `{}` are unreachable", i.cond);
                let unreachable = Expr::new(ExprKind::Throw(Box::new(Expr::literal(
                    Literal::String("unreachable".to_string()),
                ))));
                self.keep_effects(
                    cond_residual,
                    SValue::later(Constraint::Never, unreachable),
                    scope,
                )
            }
        }
    }

    /// `value`, still evaluating `effect` first when dropping it would be observable.
    fn keep_effects(&mut self, effect: Expr, value: SValue, scope: &Scope) -> Result<SValue> {
        if is_pure(&effect) {
            return Ok(value);
        }
        let residual = self.residualize(&value, scope)?;
        Ok(SValue::later(
            value.constraint(),
            Expr::let_in(Pattern::Wildcard, effect, residual),
        ))
    }

    pub(super) fn stage_logical(&mut self, b: &ExprBinary, scope: &Scope) -> Result<SValue> {
        let is_and = b.op == BinOpKind::And;
        let lhs = self.stage(&b.lhs, scope)?;
        if let Some(value) = lhs.as_value() {
            let l = operators::condition(value)?;
            if l != is_and {
                return Ok(SValue::now(Value::Bool(l)));
            }
            let rhs = self.stage(&b.rhs, scope)?;
            return match rhs.as_value() {
                Some(r) => Ok(SValue::now(Value::Bool(operators::condition(r)?))),
                None => {
                    require(&rhs.constraint(), &Constraint::IsBool, &format!("`{}`", b.op))?;
                    Ok(rhs)
                }
            };
        }
        let lc = lhs.constraint();
        require(&lc, &Constraint::IsBool, &format!("`{}`", b.op))?;
        let refinements = {
            let Branches { then, otherwise } = self.condition_branches(&b.lhs, scope);
            if is_and {
                then
            } else {
                otherwise
            }
        };
        let rhs_scope = scope.refine(&refinements);
        let rhs = self.in_branch(true, |s| s.stage(&b.rhs, &rhs_scope))?;
        let rc = rhs.constraint();
        if let Some(r) = rhs.as_value() {
            operators::condition(r)?;
        } else {
            require(&rc, &Constraint::IsBool, &format!("`{}`", b.op))?;
        }
        let absorbing = Constraint::equals(!is_and);
        let neutral = Constraint::equals(is_and);
        let constraint = if lc == absorbing || rc == absorbing {
            absorbing
        } else if lc == neutral && rc == neutral {
            neutral
        } else {
            Constraint::IsBool
        };
        let residual = Expr::new(ExprKind::Binary(ExprBinary {
            op: b.op,
            lhs: Box::new(self.residualize(&lhs, scope)?),
            rhs: Box::new(self.residualize(&rhs, &rhs_scope)?),
        }));
        Ok(SValue::later(constraint, residual))
    }

    /// The constraint a pattern tests and the pattern as it appears in
    /// residual code, where bindings are replaced by projections.
    pub(super) fn lower_pattern(
        &mut self,
        pattern: &Pattern,
        scope: &Scope,
    ) -> Result<(Constraint, Pattern)> {
        Ok(match pattern {
            Pattern::Wildcard | Pattern::Binding(_) => (Constraint::Any, Pattern::Wildcard),
            Pattern::Literal(l) => (Constraint::Equals(l.to_value()), pattern.clone()),
            Pattern::Object(fields) => {
                let mut constraints = Vec::with_capacity(fields.len());
                let mut lowered = Vec::with_capacity(fields.len());
                for field in fields {
                    let (c, p) = self.lower_pattern(&field.pattern, scope)?;
                    constraints.push((field.name.clone(), c));
                    lowered.push(PatternField {
                        name: field.name.clone(),
                        pattern: p,
                    });
                }
                (Constraint::record(constraints), Pattern::Object(lowered))
            }
            Pattern::Array(array) => {
                let mut items = vec![
                    Constraint::IsArray,
                    Constraint::length(match array.rest {
                        Some(_) => Constraint::and([
                            Constraint::IsNumber,
                            Constraint::Gte(array.items.len() as f64),
                        ]),
                        None => Constraint::equals(array.items.len() as f64),
                    }),
                ];
                let mut lowered = Vec::with_capacity(array.items.len());
                for (i, item) in array.items.iter().enumerate() {
                    let (c, p) = self.lower_pattern(item, scope)?;
                    items.push(Constraint::element_at(i, c));
                    lowered.push(p);
                }
                (
                    Constraint::And(items),
                    Pattern::Array(PatternArray {
                        items: lowered,
                        rest: array.rest.as_ref().map(|_| "_".to_string()),
                    }),
                )
            }
            Pattern::Type(t) => {
                let ty = self.pattern_type(&t.ty, scope)?;
                let (inner_c, inner_p) = self.lower_pattern(&t.inner, scope)?;
                (
                    Constraint::and([ty.clone(), inner_c]),
                    Pattern::Type(PatternType {
                        ty: Box::new(Expr::new(ExprKind::Value(Box::new(Value::ty(ty))))),
                        inner: Box::new(inner_p),
                    }),
                )
            }
        })
    }

    pub(super) fn stage_match(&mut self, m: &ExprMatch, scope: &Scope) -> Result<SValue> {
        let subject = self.stage(&m.scrutinee, scope)?;
        let pending = self.prepare_binding(scope, MATCH_SUBJECT, "subject", subject)?;
        let inner = pending.inner.clone();
        let Some(bound) = inner.get(MATCH_SUBJECT) else {
            type_bail!("match subject was not bound")
        };
        let scrutinee_name = m
            .scrutinee
            .as_var()
            .filter(|name| scope.contains(name))
            .map(str::to_string);

        let mut remaining = simplify(&bound.constraint());
        let mut cases = Vec::new();
        let mut constraints = Vec::new();
        let mut direct = None;
        for case in &m.cases {
            if remaining.is_never() {
                break;
            }
            let (tested, residual_pattern) = self.lower_pattern(&case.pattern, &inner)?;
            if disjoint(&remaining, &tested) {
                debug!("match case `{}` cannot match", case.pattern);
                continue;
            }
            let always = implies(&remaining, &tested);
            let narrowed = simplify(&Constraint::and([remaining.clone(), tested.clone()]));
            let mut case_scope = inner.refine(&[(MATCH_SUBJECT.to_string(), narrowed.clone())].into());
            if let Some(name) = &scrutinee_name {
                case_scope = case_scope.refine(&[(name.clone(), narrowed.clone())].into());
            }
            let case_subject = refine_svalue(bound.clone(), &narrowed);
            let (case_scope, _) =
                self.destructure(&case.pattern, case_subject, &case_scope, true)?;

            let runtime = !always || !cases.is_empty();
            let (guard, body_scope) = match &case.guard {
                None => (None, case_scope),
                Some(g) => {
                    let value = self.in_branch(runtime, |s| s.stage(g, &case_scope))?;
                    match value.as_value() {
                        Some(v) if !operators::condition(v)? => continue,
                        Some(_) => (None, case_scope),
                        None => {
                            require(&value.constraint(), &Constraint::IsBool, "match guard")?;
                            let residual = self.residualize(&value, &case_scope)?;
                            let refined = case_scope.refine(&self.condition_branches(g, &case_scope).then);
                            (Some(residual), refined)
                        }
                    }
                }
            };
            let guarded = guard.is_some();
            let body = self.in_branch(runtime || guarded, |s| s.stage(&case.body, &body_scope))?;
            if always && !guarded && cases.is_empty() {
                direct = Some(body);
                break;
            }
            constraints.push(body.constraint());
            cases.push(MatchCase {
                pattern: residual_pattern,
                guard,
                body: self.residualize(&body, &body_scope)?,
            });
            if always && !guarded {
                break;
            }
            if !guarded {
                remaining = exclude(&remaining, &tested);
            }
        }

        let result = match direct {
            Some(body) => body,
            None if cases.is_empty() => {
                type_bail!("non-exhaustive match: no case accepts {}", bound.constraint())
            }
            None => {
                let scrutinee = self.residualize(&bound, &inner)?;
                SValue::later(
                    simplify(&Constraint::Or(constraints)),
                    Expr::new(ExprKind::Match(ExprMatch {
                        scrutinee: Box::new(scrutinee),
                        cases,
                    })),
                )
            }
        };
        self.finish_binding(pending, result)
    }

    fn pattern_type(&mut self, ty: &Expr, scope: &Scope) -> Result<Constraint> {
        match self.stage(ty, scope)? {
            SValue::Now {
                value: Value::Type(c),
                ..
            } => Ok(*c),
            SValue::Now { value, .. } => type_bail!("{} is not a type", value.repr()),
            _ => Err(crate::error::staging_error_at(
                format!("type `{}` must be known at compile time", ty),
                ty.span,
            )),
        }
    }
}
