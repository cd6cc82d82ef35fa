//! Let-bindings, destructuring and blocks.
//!
//! A binding is prepared before its body is staged and finished after:
//! finishing decides whether the residual body needs a `let` for the bound
//! value, or for the definitions staged for a bound closure.

use super::{Definitions, DefState, Scope, Stager};
use crate::{stage_bail, type_bail_at};
use crate::imports::ImportedBinding;
use crate::refine::Refinements;
use crate::svalue::{refine_svalue, Binding, SValue};
use rf_core::ast::{BlockItem, Expr, ExprBlock, ExprKind, ExprLet, Pattern, StmtImport};
use rf_core::error::Error;
use rf_core::{type_bail, Constraint, Result, Value};
use rf_optimize::{count_uses, is_pure, is_trivial, mentions};
use rf_typing::{disjoint, simplify};
use std::collections::BTreeSet;
use tracing::debug;

pub(super) enum Emission {
    /// Nothing to emit; the bound value is referenced directly.
    None,
    /// `let name = init` for a runtime value.
    Later { name: String, init: Expr },
    /// `let name = value` if the body still refers to the compound value.
    Compound { binding: Binding, value: SValue },
    /// Definitions staged for calls of the closure.
    Closure { binding: Binding },
}

pub(super) struct Pending {
    emission: Emission,
    pub(super) inner: Scope,
    outer: Scope,
}

impl Stager {
    /// Bind `value` as `source` in a new scope; `hint` names its residual.
    pub(super) fn prepare_binding(
        &mut self,
        scope: &Scope,
        source: &str,
        hint: &str,
        value: SValue,
    ) -> Result<Pending> {
        let pending = |emission, inner| Pending {
            emission,
            inner,
            outer: scope.clone(),
        };
        if source == "_" {
            return Ok(match value {
                SValue::Later { residual, .. } if !is_trivial(&residual) => pending(
                    Emission::Later {
                        name: "_".to_string(),
                        init: residual,
                    },
                    scope.clone(),
                ),
                _ => pending(Emission::None, scope.clone()),
            });
        }
        if value.binding().is_some_and(|b| scope.is_visible(b)) {
            return Ok(pending(Emission::None, scope.bind(source, value)));
        }
        let primitive = matches!(&value, SValue::Now { value: v, .. } if !v.is_compound());
        if primitive {
            return Ok(pending(Emission::None, scope.bind(source, value)));
        }
        Ok(match value {
            SValue::Later {
                constraint,
                residual,
            } => {
                if is_trivial(&residual) {
                    let value = SValue::later(constraint, residual);
                    pending(Emission::None, scope.bind(source, value))
                } else {
                    let name = self.fresh_name(hint, scope);
                    let id = self.fresh_id();
                    let bound = SValue::later(constraint, Expr::var(&name));
                    let inner = scope.bind(source, bound).bind_residual(&name, id);
                    pending(
                        Emission::Later {
                            name,
                            init: residual,
                        },
                        inner,
                    )
                }
            }
            SValue::Closure(_) => {
                let binding = self.fresh_binding(hint, scope);
                let inner = scope
                    .bind(source, value.with_binding(binding.clone()))
                    .bind_residual(&binding.name, binding.id);
                pending(Emission::Closure { binding }, inner)
            }
            compound => {
                let binding = self.fresh_binding(hint, scope);
                let bound = compound.clone().with_binding(binding.clone());
                let inner = scope
                    .bind(source, bound)
                    .bind_residual(&binding.name, binding.id);
                pending(
                    Emission::Compound {
                        binding,
                        value: compound,
                    },
                    inner,
                )
            }
        })
    }

    fn fresh_binding(&mut self, hint: &str, scope: &Scope) -> Binding {
        Binding {
            name: self.fresh_name(hint, scope),
            id: self.fresh_id(),
        }
    }

    /// Close a prepared binding around the staged body `result`.
    pub(super) fn finish_binding(&mut self, pending: Pending, result: SValue) -> Result<SValue> {
        let Pending {
            emission,
            inner,
            outer,
        } = pending;
        match emission {
            Emission::None => Ok(result),
            Emission::Later { name, init } => {
                if result.is_now() && is_pure(&init) {
                    return Ok(result);
                }
                let residual = self.residualize(&result, &inner)?;
                let constraint = result.constraint();
                if name != "_" && mentions(&residual, &name) {
                    Ok(SValue::later(
                        constraint,
                        Expr::let_in(Pattern::binding(name), init, residual),
                    ))
                } else if !is_pure(&init) {
                    Ok(SValue::later(
                        constraint,
                        Expr::let_in(Pattern::Wildcard, init, residual),
                    ))
                } else {
                    Ok(result)
                }
            }
            Emission::Compound { binding, value } => {
                if result.is_now() || !result.has_later() && !result.is_closure() {
                    return Ok(result.clear_binding(binding.id));
                }
                let residual = self.residualize(&result, &inner)?;
                let uses = count_uses(&residual, &binding.name);
                if uses == 0 {
                    return Ok(result.clear_binding(binding.id));
                }
                let init = self.residualize(&value, &outer)?;
                let constraint = result.constraint();
                let residual = if uses == 1 {
                    substitute(&residual, &binding.name, &init)
                } else {
                    Expr::let_in(Pattern::binding(&binding.name), init, residual)
                };
                Ok(SValue::later(constraint, residual))
            }
            Emission::Closure { binding } => {
                let same = result
                    .as_closure()
                    .is_some_and(|c| c.binding.as_ref() == Some(&binding));
                if same || result.is_now() {
                    self.definitions.remove(&binding.id);
                    return Ok(result.clear_binding(binding.id));
                }
                let residual = self.residualize(&result, &inner)?;
                let constraint = result.constraint();
                match self.emit_definitions(&binding, residual) {
                    Some(wrapped) => Ok(SValue::later(constraint, wrapped)),
                    None => Ok(result.clear_binding(binding.id)),
                }
            }
        }
    }

    pub(super) fn finish_all(&mut self, pending: Vec<Pending>, result: SValue) -> Result<SValue> {
        pending
            .into_iter()
            .rev()
            .try_fold(result, |result, p| self.finish_binding(p, result))
    }

    /// Wrap `body` in the definitions of `binding` it needs, each one
    /// outside the definitions that call it. `None` when none are needed.
    fn emit_definitions(&mut self, binding: &Binding, body: Expr) -> Option<Expr> {
        let Definitions { generic, specs } = self.definitions.remove(&binding.id)?;
        let mut defs: Vec<(String, Expr)> = Vec::new();
        if let Some(DefState::Done { lambda, .. }) = generic {
            defs.push((binding.name.clone(), lambda));
        }
        for spec in specs {
            if let DefState::Done { lambda, .. } = spec.state {
                defs.push((spec.name, lambda));
            }
        }

        let mut needed: BTreeSet<String> = defs
            .iter()
            .filter(|(name, _)| mentions(&body, name))
            .map(|(name, _)| name.clone())
            .collect();
        loop {
            let more: Vec<String> = defs
                .iter()
                .filter(|(name, _)| needed.contains(name))
                .flat_map(|(_, lambda)| {
                    defs.iter()
                        .filter(|(other, _)| !needed.contains(other) && mentions(lambda, other))
                        .map(|(other, _)| other.clone())
                })
                .collect();
            if more.is_empty() {
                break;
            }
            needed.extend(more);
        }
        if needed.is_empty() {
            return None;
        }
        let mut remaining: Vec<(String, Expr)> =
            defs.into_iter().filter(|(name, _)| needed.contains(name)).collect();
        debug!(
            "emitting {} definition(s) for `{}`",
            remaining.len(),
            binding.name
        );

        let mut body = body;
        while !remaining.is_empty() {
            let innermost = remaining
                .iter()
                .position(|(name, _)| {
                    !remaining
                        .iter()
                        .any(|(other, lambda)| other != name && mentions(lambda, name))
                })
                .unwrap_or(0);
            let (name, lambda) = remaining.remove(innermost);
            body = Expr::let_in(Pattern::binding(name), lambda, body);
        }
        Some(body)
    }

    /// Bind the names of `pattern` to the parts of `value`.
    ///
    /// With `inline`, names are bound directly to projections of `value`;
    /// otherwise every name and intermediate value goes through a binding.
    pub(super) fn destructure(
        &mut self,
        pattern: &Pattern,
        value: SValue,
        scope: &Scope,
        inline: bool,
    ) -> Result<(Scope, Vec<Pending>)> {
        match pattern {
            Pattern::Binding(name) if inline => Ok((scope.bind(name, value), Vec::new())),
            Pattern::Wildcard if inline => Ok((scope.clone(), Vec::new())),
            Pattern::Binding(name) => {
                let pending = self.prepare_binding(scope, name, name, value)?;
                Ok((pending.inner.clone(), vec![pending]))
            }
            Pattern::Wildcard => {
                let pending = self.prepare_binding(scope, "_", "_", value)?;
                Ok((pending.inner.clone(), vec![pending]))
            }
            Pattern::Literal(l) => {
                let expected = Constraint::Equals(l.to_value());
                let c = value.constraint();
                if !c.is_never() && disjoint(&c, &expected) {
                    type_bail!("{} can never match pattern {}", c, pattern);
                }
                if inline {
                    return Ok((scope.clone(), Vec::new()));
                }
                let pending = self.prepare_binding(scope, "_", "_", value)?;
                Ok((pending.inner.clone(), vec![pending]))
            }
            Pattern::Type(t) => {
                let ty = match self.stage(&t.ty, scope)? {
                    SValue::Now {
                        value: Value::Type(c),
                        ..
                    } => *c,
                    SValue::Now { value, .. } => {
                        type_bail_at!(t.ty.span, "{} is not a type", value.repr())
                    }
                    _ => stage_bail!(t.ty.span, "type `{}` must be known at compile time", t.ty),
                };
                if simplify(&ty).is_never() {
                    return Err(Error::contradiction(format!("type `{}` admits no value", t.ty))
                        .with_span(t.ty.span));
                }
                let c = value.constraint();
                if !c.is_never() && disjoint(&c, &ty) {
                    type_bail!("{} can never match type {}", c, ty);
                }
                self.destructure(&t.inner, refine_svalue(value, &ty), scope, inline)
            }
            Pattern::Object(fields) => {
                let (subject, mut scope, mut pending) = self.subject(value, scope, inline)?;
                for field in fields {
                    let part = self.field_of(&subject, &field.name)?;
                    let (next, more) = self.destructure(&field.pattern, part, &scope, inline)?;
                    scope = next;
                    pending.extend(more);
                }
                Ok((scope, pending))
            }
            Pattern::Array(array) => {
                let (subject, mut scope, mut pending) = self.subject(value, scope, inline)?;
                let c = subject.constraint();
                let length = match array.rest {
                    Some(_) => Constraint::and([
                        Constraint::IsNumber,
                        Constraint::Gte(array.items.len() as f64),
                    ]),
                    None => Constraint::equals(array.items.len() as f64),
                };
                let shape = Constraint::and([Constraint::IsArray, Constraint::length(length)]);
                if !c.is_never() && disjoint(&c, &shape) {
                    type_bail!("{} can never match pattern {}", c, pattern);
                }
                for (i, item) in array.items.iter().enumerate() {
                    let index = SValue::now(Value::number(i as f64));
                    let part = self.index_of(&subject, &index, &scope)?;
                    let (next, more) = self.destructure(item, part, &scope, inline)?;
                    scope = next;
                    pending.extend(more);
                }
                if let Some(rest) = &array.rest {
                    let part = self.rest_of(&subject, array.items.len(), &scope)?;
                    let (next, more) =
                        self.destructure(&Pattern::binding(rest), part, &scope, inline)?;
                    scope = next;
                    pending.extend(more);
                }
                Ok((scope, pending))
            }
        }
    }

    /// The value to project from; bound to a temporary unless `inline`.
    fn subject(
        &mut self,
        value: SValue,
        scope: &Scope,
        inline: bool,
    ) -> Result<(SValue, Scope, Vec<Pending>)> {
        if inline {
            return Ok((value, scope.clone(), Vec::new()));
        }
        let source = format!("#{}", self.fresh_id());
        let pending = self.prepare_binding(scope, &source, "tmp", value)?;
        let inner = pending.inner.clone();
        let subject = inner
            .get(&source)
            .ok_or_else(|| Error::staging("destructured value was not bound"))?;
        Ok((subject, inner, vec![pending]))
    }

    pub(super) fn stage_let(&mut self, l: &ExprLet, scope: &Scope) -> Result<SValue> {
        let value = self.stage(&l.init, scope)?;
        let (inner, pending) = self.destructure(&l.pattern, value, scope, false)?;
        let result = self.stage(&l.body, &inner)?;
        self.finish_all(pending, result)
    }

    pub(super) fn stage_items(
        &mut self,
        items: &[BlockItem],
        result: &Expr,
        scope: &Scope,
    ) -> Result<SValue> {
        let Some((item, rest)) = items.split_first() else {
            return self.stage(result, scope);
        };
        match item {
            BlockItem::Let(s) => {
                let value = self.stage(&s.init, scope)?;
                let (inner, pending) = self.destructure(&s.pattern, value, scope, false)?;
                let result = self.stage_items(rest, result, &inner)?;
                self.finish_all(pending, result)
            }
            BlockItem::Expr(e) => {
                let value = self.stage(e, scope)?;
                let pending = self.prepare_binding(scope, "_", "_", value)?;
                let next = match asserted_condition(e) {
                    Some(cond) => {
                        let refinements: Refinements = self.condition_branches(cond, scope).then;
                        scope.refine(&refinements)
                    }
                    None => scope.clone(),
                };
                let result = self.stage_items(rest, result, &next)?;
                self.finish_binding(pending, result)
            }
            BlockItem::Import(import) => self.stage_import(import, rest, result, scope),
        }
    }

    fn stage_import(
        &mut self,
        import: &StmtImport,
        rest: &[BlockItem],
        result: &Expr,
        scope: &Scope,
    ) -> Result<SValue> {
        let mut inner = scope.clone();
        let mut declared = Vec::new();
        let imports = self.imports.clone();
        for name in &import.names {
            match imports.resolve(&import.module, name) {
                Some(ImportedBinding::Value(value)) => {
                    inner = inner.bind(name, SValue::now(value.clone()));
                }
                Some(ImportedBinding::Declared(c)) => {
                    let id = self.fresh_id();
                    inner = inner
                        .bind(name, SValue::later(c.clone(), Expr::var(name)))
                        .bind_residual(name, id);
                    declared.push(name.clone());
                }
                None => type_bail!("module \"{}\" has no export `{}`", import.module, name),
            }
        }
        let value = self.stage_items(rest, result, &inner)?;
        if value.is_now() || declared.is_empty() {
            return Ok(value);
        }
        let residual = self.residualize(&value, &inner)?;
        let used: Vec<String> = declared
            .into_iter()
            .filter(|name| mentions(&residual, name))
            .collect();
        if used.is_empty() {
            return Ok(value);
        }
        let block = Expr::new(ExprKind::Block(ExprBlock {
            items: vec![BlockItem::Import(StmtImport {
                names: used,
                module: import.module.clone(),
            })],
            result: Box::new(residual),
        }));
        Ok(SValue::later(value.constraint(), block))
    }
}

/// The condition of an `assert(cond)` statement.
fn asserted_condition(e: &Expr) -> Option<&Expr> {
    match &e.kind {
        ExprKind::Call(call) if call.callee.as_var() == Some("assert") => match call.args.as_slice() {
            [cond] => Some(cond),
            _ => None,
        },
        _ => None,
    }
}

/// Replace free occurrences of `name` in `expr`.
pub(super) fn substitute(expr: &Expr, name: &str, replacement: &Expr) -> Expr {
    if !mentions(expr, name) {
        return expr.clone();
    }
    let sub = |e: &Expr| substitute(e, name, replacement);
    let kind = match &expr.kind {
        ExprKind::Var(v) if v == name => return replacement.clone(),
        ExprKind::Let(l) => {
            let init = sub(&l.init);
            let body = if l.pattern.bound_names().iter().any(|n| n == name) {
                (*l.body).clone()
            } else {
                sub(&l.body)
            };
            ExprKind::Let(ExprLet {
                pattern: l.pattern.clone(),
                init: Box::new(init),
                body: Box::new(body),
            })
        }
        ExprKind::Lambda(lambda) => {
            let shadowed = lambda.name.as_deref() == Some(name)
                || lambda.param_names().any(|p| p == name)
                || name == rf_optimize::ARGS;
            if shadowed {
                return expr.clone();
            }
            let mut lambda = (**lambda).clone();
            lambda.body = sub(&lambda.body);
            ExprKind::Lambda(std::sync::Arc::new(lambda))
        }
        _ => return map_children(expr, &sub),
    };
    Expr {
        kind,
        span: expr.span,
    }
}

/// Rebuild `expr` with `f` applied to each direct child expression.
fn map_children(expr: &Expr, f: &dyn Fn(&Expr) -> Expr) -> Expr {
    use rf_core::ast::*;
    let b = |e: &Expr| Box::new(f(e));
    let kind = match &expr.kind {
        ExprKind::Unary(u) => ExprKind::Unary(ExprUnary {
            op: u.op,
            operand: b(&u.operand),
        }),
        ExprKind::Binary(x) => ExprKind::Binary(ExprBinary {
            op: x.op,
            lhs: b(&x.lhs),
            rhs: b(&x.rhs),
        }),
        ExprKind::If(i) => ExprKind::If(ExprIf {
            cond: b(&i.cond),
            then: b(&i.then),
            otherwise: b(&i.otherwise),
        }),
        ExprKind::Call(c) => ExprKind::Call(ExprCall {
            callee: b(&c.callee),
            args: c.args.iter().map(f).collect(),
        }),
        ExprKind::Object(entries) => ExprKind::Object(
            entries
                .iter()
                .map(|e| match e {
                    ObjectEntry::Field { name, value } => ObjectEntry::Field {
                        name: name.clone(),
                        value: f(value),
                    },
                    ObjectEntry::Spread(e) => ObjectEntry::Spread(f(e)),
                })
                .collect(),
        ),
        ExprKind::Array(entries) => ExprKind::Array(
            entries
                .iter()
                .map(|e| match e {
                    ArrayEntry::Item(e) => ArrayEntry::Item(f(e)),
                    ArrayEntry::Spread(e) => ArrayEntry::Spread(f(e)),
                })
                .collect(),
        ),
        ExprKind::Field(x) => ExprKind::Field(ExprField {
            object: b(&x.object),
            name: x.name.clone(),
        }),
        ExprKind::Index(x) => ExprKind::Index(ExprIndex {
            object: b(&x.object),
            index: b(&x.index),
        }),
        ExprKind::Template(parts) => ExprKind::Template(
            parts
                .iter()
                .map(|p| match p {
                    TemplatePart::Text(t) => TemplatePart::Text(t.clone()),
                    TemplatePart::Expr(e) => TemplatePart::Expr(f(e)),
                })
                .collect(),
        ),
        ExprKind::Await(e) => ExprKind::Await(b(e)),
        ExprKind::Throw(e) => ExprKind::Throw(b(e)),
        ExprKind::Match(m) => ExprKind::Match(ExprMatch {
            scrutinee: b(&m.scrutinee),
            cases: m
                .cases
                .iter()
                .map(|c| MatchCase {
                    pattern: c.pattern.clone(),
                    guard: c.guard.as_ref().map(f),
                    body: f(&c.body),
                })
                .collect(),
        }),
        ExprKind::Block(block) => ExprKind::Block(ExprBlock {
            items: block
                .items
                .iter()
                .map(|item| match item {
                    BlockItem::Let(l) => BlockItem::Let(StmtLet {
                        pattern: l.pattern.clone(),
                        init: f(&l.init),
                    }),
                    BlockItem::Expr(e) => BlockItem::Expr(f(e)),
                    BlockItem::Import(i) => BlockItem::Import(i.clone()),
                })
                .collect(),
            result: b(&block.result),
        }),
        other => other.clone(),
    };
    Expr {
        kind,
        span: expr.span,
    }
}
