//! Calls: special forms, builtins and closures.
//!
//! A closure call with compile-time arguments is evaluated in place. With
//! runtime arguments the call becomes residual, targeting the generic
//! definition of the callee or, when compile-time positions receive
//! different values, one specialization per key.

use super::{DefState, SpecArg, Specialization, Scope, Stager, DEFAULT_INPUT};
use crate::builtins::{Builtin, BuiltinEval, StagingContext};
use crate::error::{assertion_error_at, staging_error_at, type_error_at};
use crate::svalue::{refine_svalue, Binding, SValue, StagedClosure};
use crate::{stage_bail, stage_ensure};
use rf_core::ast::{Expr, ExprCall, ExprKind, Lambda, Param};
use rf_core::error::Error;
use rf_core::span::Span;
use rf_core::{type_bail, type_ensure, Constraint, Result, Value};
use rf_optimize::{ComptimeParams, ARGS};
use rf_typing::{disjoint, implies, satisfies, simplify, unify};
use std::sync::Arc;
use tracing::debug;

const SPECIAL_FORMS: &[&str] = &["comptime", "runtime", "typeOf", "assert", "trust"];

/// Staging services handed to staged builtins.
struct BuiltinCx<'a> {
    stager: &'a mut Stager,
    scope: &'a Scope,
    span: Option<Span>,
}

impl StagingContext for BuiltinCx<'_> {
    fn invoke(&mut self, callee: &SValue, args: Vec<SValue>) -> Result<SValue> {
        self.stager.apply_staged(callee, args, self.span, self.scope)
    }

    fn warn(&mut self, message: String) {
        self.stager.warn(message, self.span);
    }
}

fn type_value(c: Constraint) -> Expr {
    Expr::new(ExprKind::Value(Box::new(Value::ty(c))))
}

impl Stager {
    pub(super) fn stage_call(
        &mut self,
        call: &ExprCall,
        span: Option<Span>,
        scope: &Scope,
    ) -> Result<SValue> {
        if let Some(name) = call.callee.as_var() {
            if SPECIAL_FORMS.contains(&name) && !scope.contains(name) {
                return self.stage_special(name, &call.args, span, scope);
            }
        }
        if let ExprKind::Field(f) = &call.callee.kind {
            let receiver = self.stage(&f.object, scope)?;
            if let Some(method) = self.registry.method(&f.name).cloned() {
                if !has_own_field(&receiver, &f.name) {
                    let rest = self.stage_args(&call.args, scope)?;
                    let args = method.from_method_args(receiver, rest);
                    return self.stage_builtin(&method, args, span, scope);
                }
            }
            let callee = self.field_of(&receiver, &f.name)?;
            let args = self.stage_args(&call.args, scope)?;
            return self.apply_staged(&callee, args, span, scope);
        }
        let callee = self.stage(&call.callee, scope)?;
        let args = self.stage_args(&call.args, scope)?;
        self.apply_staged(&callee, args, span, scope)
    }

    fn stage_args(&mut self, args: &[Expr], scope: &Scope) -> Result<Vec<SValue>> {
        args.iter().map(|a| self.stage(a, scope)).collect()
    }

    /// Call a staged function value.
    pub(super) fn apply_staged(
        &mut self,
        callee: &SValue,
        args: Vec<SValue>,
        span: Option<Span>,
        scope: &Scope,
    ) -> Result<SValue> {
        match callee {
            SValue::Closure(closure) => self.call_closure(closure, args, span, scope),
            SValue::Now {
                value: Value::Builtin(name),
                ..
            } => match self.registry.get(name).cloned() {
                Some(builtin) => self.stage_builtin(&builtin, args, span, scope),
                None => type_bail!("unknown builtin `{}`", name),
            },
            SValue::Later { constraint, .. } => {
                if !constraint.is_never() && disjoint(constraint, &Constraint::IsFunction) {
                    type_bail!("{} is not a function", constraint);
                }
                let callee = self.residualize(callee, scope)?;
                let residual = self.residual_call(callee, &args, scope)?;
                Ok(SValue::later(Constraint::Any, residual))
            }
            other => type_bail!("{} is not a function", other.constraint()),
        }
    }

    fn residual_call(&mut self, callee: Expr, args: &[SValue], scope: &Scope) -> Result<Expr> {
        let args = args
            .iter()
            .map(|a| self.residualize(a, scope))
            .collect::<Result<Vec<_>>>()?;
        Ok(Expr::call(callee, args))
    }

    fn stage_special(
        &mut self,
        name: &str,
        args: &[Expr],
        span: Option<Span>,
        scope: &Scope,
    ) -> Result<SValue> {
        match (name, args) {
            ("comptime", [e]) => {
                let value = self.stage(e, scope)?;
                if !value.is_known() {
                    return Err(staging_error_at(
                        format!("`{}` is not known at compile time", e),
                        e.span,
                    ));
                }
                Ok(value)
            }
            ("runtime", [e]) => self.stage_runtime(e, DEFAULT_INPUT.to_string(), scope),
            ("runtime", [e, input]) => {
                let input = match self.stage(input, scope)?.as_value() {
                    Some(Value::String(name)) => name.clone(),
                    _ => {
                        return Err(staging_error_at(
                            "`runtime` input name must be a compile-time string",
                            input.span,
                        ))
                    }
                };
                self.stage_runtime(e, input, scope)
            }
            ("typeOf", [e]) => {
                let value = self.stage(e, scope)?;
                Ok(SValue::now(Value::ty(simplify(&value.constraint()))))
            }
            ("assert", [cond]) => self.stage_assert(cond, scope),
            ("assert", [e, ty]) => self.stage_assert_type(e, ty, span, scope),
            ("trust", [e, ty]) => {
                let value = self.stage(e, scope)?;
                let ty = self.known_type(ty, scope)?;
                let mut trusted = unify(&value.constraint(), &ty);
                if trusted.is_never() {
                    self.warn(
                        format!("trusting {} as incompatible {}", value.constraint(), ty),
                        span,
                    );
                    trusted = ty;
                }
                self.trusted(value, trusted, scope)
            }
            _ => type_bail!("wrong number of arguments to `{}`", name),
        }
    }

    /// `value` seen as `c`. Structured and function values keep their parts
    /// unless `c` tells more than they do; then they become one residual value.
    fn trusted(&mut self, value: SValue, c: Constraint, scope: &Scope) -> Result<SValue> {
        match value {
            SValue::Now { .. } | SValue::Later { .. } => Ok(value.with_constraint(c)),
            other if implies(&other.constraint(), &c) => Ok(other),
            other => {
                let residual = self.residualize(&other, scope)?;
                Ok(SValue::later(c, residual))
            }
        }
    }

    fn stage_runtime(&mut self, e: &Expr, input: String, scope: &Scope) -> Result<SValue> {
        match self.stage(e, scope)? {
            SValue::Now { constraint, .. } => Ok(SValue::later(constraint, Expr::var(input))),
            _ => Err(staging_error_at(
                format!("`runtime` needs a compile-time value, got `{}`", e),
                e.span,
            )),
        }
    }

    /// A type argument; types are compile-time values.
    fn known_type(&mut self, ty: &Expr, scope: &Scope) -> Result<Constraint> {
        match self.stage(ty, scope)? {
            SValue::Now {
                value: Value::Type(c),
                ..
            } => Ok(*c),
            SValue::Now { value, .. } => {
                Err(type_error_at(format!("{} is not a type", value.repr()), ty.span))
            }
            _ => Err(staging_error_at(
                format!("type `{}` must be known at compile time", ty),
                ty.span,
            )),
        }
    }

    fn stage_assert(&mut self, cond: &Expr, scope: &Scope) -> Result<SValue> {
        let value = self.stage(cond, scope)?;
        match value.as_value() {
            Some(Value::Bool(true)) => Ok(SValue::now(Value::Bool(true))),
            Some(Value::Bool(false)) => Err(assertion_error_at(format!("{} is false", cond), cond.span)),
            Some(other) => type_bail!("assert condition must be a boolean, got {}", other.repr()),
            None => {
                let c = value.constraint();
                type_ensure!(
                    c.is_never() || !disjoint(&c, &Constraint::IsBool),
                    "assert condition must be a boolean, got {}",
                    c
                );
                if c == Constraint::equals(false) {
                    self.warn(format!("assertion `{}` always fails", cond), cond.span);
                }
                let residual = Expr::call(Expr::var("assert"), vec![self.residualize(&value, scope)?]);
                Ok(SValue::later(Constraint::equals(true), residual))
            }
        }
    }

    fn stage_assert_type(
        &mut self,
        e: &Expr,
        ty: &Expr,
        span: Option<Span>,
        scope: &Scope,
    ) -> Result<SValue> {
        let value = self.stage(e, scope)?;
        let ty = self.known_type(ty, scope)?;
        if let Some(v) = value.as_value() {
            if !satisfies(v, &ty) {
                return Err(assertion_error_at(
                    format!("{} does not satisfy {}", v.repr(), ty),
                    e.span.or(span),
                ));
            }
            let c = unify(&value.constraint(), &ty);
            return Ok(value.with_constraint(c));
        }
        let c = value.constraint();
        if implies(&c, &ty) {
            debug!("assertion of {} elided for {}", ty, c);
            return Ok(value);
        }
        let narrowed = if disjoint(&c, &ty) {
            self.warn(format!("{} can never satisfy {}", c, ty), e.span.or(span));
            ty.clone()
        } else {
            unify(&c, &ty)
        };
        let residual = Expr::call(
            Expr::var("assert"),
            vec![self.residualize(&value, scope)?, type_value(ty)],
        );
        Ok(SValue::later(narrowed, residual))
    }

    pub(super) fn stage_builtin(
        &mut self,
        builtin: &Arc<Builtin>,
        args: Vec<SValue>,
        span: Option<Span>,
        scope: &Scope,
    ) -> Result<SValue> {
        let constraints: Vec<Constraint> = args.iter().map(SValue::constraint).collect();
        builtin.check_args(&constraints)?;
        if builtin.comptime_only && !args.iter().all(SValue::is_known) {
            stage_bail!(span, "`{}` needs compile-time arguments", builtin.name);
        }
        if let BuiltinEval::Staged { stage, .. } = builtin.eval {
            let mut cx = BuiltinCx {
                stager: self,
                scope,
                span,
            };
            if let Some(result) = stage(&mut cx, &args)? {
                return Ok(result);
            }
        }
        if let Some(values) = args
            .iter()
            .map(|a| a.as_value().cloned())
            .collect::<Option<Vec<_>>>()
        {
            let value = builtin
                .run(&mut self.interpreter, &values)
                .map_err(|e| e.with_span(span))?;
            return Ok(SValue::now(value));
        }
        if builtin.comptime_only {
            stage_bail!(span, "`{}` cannot run with function arguments", builtin.name);
        }
        let result = builtin.result_constraint(&constraints);
        if let Some(value) = result.literal() {
            if !args.iter().any(SValue::has_later) {
                return Ok(SValue::now(value.clone()));
            }
        }
        let residual = match (builtin.runtime_method, args.first()) {
            (Some(method), Some(receiver)) => {
                let receiver = self.residualize(receiver, scope)?;
                let rest = builtin.method_args(&args);
                self.residual_call(Expr::field(receiver, method), &rest, scope)?
            }
            _ => self.residual_call(Expr::var(&builtin.name), &args, scope)?,
        };
        Ok(SValue::later(result, residual))
    }

    fn call_closure(
        &mut self,
        closure: &StagedClosure,
        args: Vec<SValue>,
        span: Option<Span>,
        scope: &Scope,
    ) -> Result<SValue> {
        let lambda = &closure.lambda;
        if args.len() != lambda.arity() {
            type_bail!(
                "function expects {} argument(s), got {}",
                lambda.arity(),
                args.len()
            );
        }
        let mut checked = Vec::with_capacity(args.len());
        for (param, arg) in lambda.params.iter().zip(args) {
            checked.push(match &param.ty {
                None => arg,
                Some(ty) => {
                    let ty = self.declared_type(ty, &closure.scope)?;
                    let c = arg.constraint();
                    type_ensure!(
                        c.is_never() || !disjoint(&c, &ty),
                        "parameter `{}` expects {}, got {}",
                        param.name,
                        ty,
                        c
                    );
                    refine_svalue(arg, &ty)
                }
            });
        }
        let args = checked;

        let params = self.analysis.params(lambda);
        if args.iter().all(SValue::is_known) {
            if self.recurses_at_runtime(closure.id) {
                if let Some(deferred) = self.defer_call(closure, &params, args.clone(), scope)? {
                    return Ok(deferred);
                }
            }
            return self.invoke(closure, args, span, scope);
        }
        let closure_in_sensitive = args
            .iter()
            .enumerate()
            .any(|(i, a)| params.is_sensitive(i) && a.is_closure());
        if closure_in_sensitive {
            return self.invoke(closure, args, span, scope);
        }
        if let Some(binding) = closure.binding.as_ref().filter(|b| scope.is_visible(b)) {
            if params.any() {
                let sensitive: Vec<bool> = (0..args.len()).map(|i| params.is_sensitive(i)).collect();
                return self.specialize(closure, binding, &sensitive, args, scope);
            }
            let result = self.ensure_generic(closure, binding)?;
            let residual = self.residual_call(Expr::var(&binding.name), &args, scope)?;
            return Ok(SValue::later(result, residual));
        }
        if lambda.name.is_some() && !params.any() {
            let binding = self.self_binding(closure);
            let result = self.ensure_generic(closure, &binding)?;
            let callee = self.generic_lambda(&binding)?;
            let residual = self.residual_call(callee, &args, scope)?;
            return Ok(SValue::later(result, residual));
        }
        self.invoke(closure, args, span, scope)
    }

    /// Declared parameter type, resolved where the function was defined.
    fn declared_type(&mut self, ty: &Expr, scope: &Scope) -> Result<Constraint> {
        let c = self.known_type(ty, scope)?;
        if simplify(&c).is_never() {
            return Err(Error::contradiction(format!("type `{}` admits no value", ty)).with_span(ty.span));
        }
        Ok(c)
    }

    /// Evaluate the body in place, with the call site's residual names.
    fn invoke(
        &mut self,
        closure: &StagedClosure,
        args: Vec<SValue>,
        span: Option<Span>,
        site: &Scope,
    ) -> Result<SValue> {
        stage_ensure!(
            self.depth < self.options.max_call_depth,
            span,
            "call depth exceeded {}",
            self.options.max_call_depth
        );
        self.depth += 1;
        self.inlined.push((closure.id, self.runtime_branches));
        let result = self.invoke_body(closure, args, site);
        self.inlined.pop();
        self.depth -= 1;
        result
    }

    /// A residual call of the definition of `closure` in place of unrolling
    /// it again; `None` when it has no name to be called by.
    fn defer_call(
        &mut self,
        closure: &StagedClosure,
        params: &ComptimeParams,
        args: Vec<SValue>,
        scope: &Scope,
    ) -> Result<Option<SValue>> {
        debug!(
            "deferring recursion of `{}` bounded at runtime",
            closure.lambda.name.as_deref().unwrap_or("fn")
        );
        if let Some(binding) = closure.binding.as_ref().filter(|b| scope.is_visible(b)) {
            if params.any() {
                let sensitive: Vec<bool> = (0..args.len()).map(|i| params.is_sensitive(i)).collect();
                return self.specialize(closure, binding, &sensitive, args, scope).map(Some);
            }
            let result = self.ensure_generic(closure, binding)?;
            let residual = self.residual_call(Expr::var(&binding.name), &args, scope)?;
            return Ok(Some(SValue::later(result, residual)));
        }
        if closure.lambda.name.is_none() || params.any() {
            return Ok(None);
        }
        let binding = self.self_binding(closure);
        let result = self.ensure_generic(closure, &binding)?;
        let callee = self.generic_lambda(&binding)?;
        let residual = self.residual_call(callee, &args, scope)?;
        Ok(Some(SValue::later(result, residual)))
    }

    fn invoke_body(
        &mut self,
        closure: &StagedClosure,
        args: Vec<SValue>,
        site: &Scope,
    ) -> Result<SValue> {
        let lambda = &closure.lambda;
        let mut scope = closure.scope.with_residual_of(site);
        if let Some(name) = &lambda.name {
            scope = scope.bind(name, SValue::Closure(closure.clone()));
        }
        scope = scope.bind(ARGS, SValue::array(args.clone()));
        let mut pending = Vec::with_capacity(args.len());
        for (param, arg) in lambda.params.iter().zip(args) {
            let p = self.prepare_binding(&scope, &param.name, &param.name, arg)?;
            scope = p.inner.clone();
            pending.push(p);
        }
        let result = self.stage(&lambda.body, &scope)?;
        self.finish_all(pending, result)
    }

    /// Made-up binding of a named closure called where no binding is visible.
    pub(super) fn self_binding(&mut self, closure: &StagedClosure) -> Binding {
        if let Some(binding) = self.self_bindings.get(&closure.id) {
            return binding.clone();
        }
        let base = closure.lambda.name.clone().unwrap_or_else(|| "f".to_string());
        let binding = Binding {
            name: self.fresh_name(&base, &closure.scope),
            id: self.fresh_id(),
        };
        self.self_bindings.insert(closure.id, binding.clone());
        binding
    }

    /// The staged lambda of a made-up binding, used in place of its name.
    pub(super) fn generic_lambda(&mut self, binding: &Binding) -> Result<Expr> {
        match self
            .definitions
            .get(&binding.id)
            .and_then(|defs| defs.generic.as_ref())
        {
            Some(DefState::Done { lambda, .. }) => Ok(lambda.clone()),
            _ => Ok(Expr::var(&binding.name)),
        }
    }

    /// Stage the definition of `binding` for arbitrary arguments, once;
    /// the result constraint of its calls.
    pub(super) fn ensure_generic(
        &mut self,
        closure: &StagedClosure,
        binding: &Binding,
    ) -> Result<Constraint> {
        match self
            .definitions
            .get(&binding.id)
            .and_then(|defs| defs.generic.as_ref())
        {
            Some(DefState::Done { result, .. }) => return Ok(result.clone()),
            Some(DefState::InProgress) => {
                debug!("recursive call of `{}` while staging it", binding.name);
                return Ok(Constraint::Any);
            }
            None => {}
        }
        self.definitions.entry(binding.id).or_default().generic = Some(DefState::InProgress);
        let arity = closure.lambda.arity();
        let (lambda, result) = self.stage_definition(
            closure,
            Some(&binding.name),
            Some(binding),
            &vec![None; arity],
            &vec![None; arity],
        )?;
        self.definitions.entry(binding.id).or_default().generic = Some(DefState::Done {
            lambda,
            result: result.clone(),
        });
        Ok(result)
    }

    /// A residual call of the specialization of `binding` for the
    /// compile-time parts of `args`.
    fn specialize(
        &mut self,
        closure: &StagedClosure,
        binding: &Binding,
        sensitive: &[bool],
        args: Vec<SValue>,
        scope: &Scope,
    ) -> Result<SValue> {
        let key: Vec<SpecArg> = args
            .iter()
            .zip(sensitive)
            .map(|(arg, sensitive)| match (sensitive, arg.as_value()) {
                (false, _) => SpecArg::Dynamic,
                (true, Some(value)) => SpecArg::Value(value.clone()),
                (true, None) => SpecArg::Type(simplify(&arg.constraint())),
            })
            .collect();
        let fixed: Vec<Option<SValue>> = args
            .iter()
            .zip(sensitive)
            .map(|(arg, sensitive)| (*sensitive && arg.is_now()).then(|| arg.clone()))
            .collect();
        let dynamic: Vec<SValue> = args
            .iter()
            .zip(&fixed)
            .filter(|(_, fixed)| fixed.is_none())
            .map(|(arg, _)| arg.clone())
            .collect();

        let existing = self.definitions.get(&binding.id).and_then(|defs| {
            defs.specs
                .iter()
                .find(|spec| spec.key == key)
                .map(|spec| (spec.name.clone(), spec.state.clone()))
        });
        let (name, result) = match existing {
            Some((name, DefState::Done { result, .. })) => (name, result),
            Some((name, DefState::InProgress)) => {
                debug!("recursive specialization `{}`", name);
                (name, Constraint::Any)
            }
            None => {
                if self.specializations >= self.options.max_specializations {
                    return Err(Error::staging(format!(
                        "more than {} specializations; `{}` is called with too many compile-time keys",
                        self.options.max_specializations, binding.name
                    )));
                }
                self.specializations += 1;
                let count = self
                    .definitions
                    .get(&binding.id)
                    .map_or(0, |defs| defs.specs.len());
                let name = self.fresh_name(&format!("{}_{}", binding.name, count + 1), scope);
                self.reserved.insert(name.clone());
                self.definitions
                    .entry(binding.id)
                    .or_default()
                    .specs
                    .push(Specialization {
                        key: key.clone(),
                        name: name.clone(),
                        state: DefState::InProgress,
                    });
                let hints: Vec<Option<Constraint>> = args
                    .iter()
                    .zip(sensitive)
                    .map(|(arg, sensitive)| (*sensitive && !arg.is_now()).then(|| arg.constraint()))
                    .collect();
                let (lambda, result) =
                    self.stage_definition(closure, Some(&name), Some(binding), &fixed, &hints)?;
                if let Some(spec) = self
                    .definitions
                    .get_mut(&binding.id)
                    .and_then(|defs| defs.specs.iter_mut().find(|spec| spec.key == key))
                {
                    spec.state = DefState::Done {
                        lambda,
                        result: result.clone(),
                    };
                }
                debug!("specialized `{}` as `{}`", binding.name, name);
                (name, result)
            }
        };
        let residual = self.residual_call(Expr::var(name), &dynamic, scope)?;
        Ok(SValue::later(result, residual))
    }

    /// Stage the body of `closure` with runtime parameters into a lambda.
    ///
    /// `fixed` parameters are bound to compile-time values and dropped from
    /// the signature; `hints` narrow the others.
    pub(super) fn stage_definition(
        &mut self,
        closure: &StagedClosure,
        def_name: Option<&str>,
        self_binding: Option<&Binding>,
        fixed: &[Option<SValue>],
        hints: &[Option<Constraint>],
    ) -> Result<(Expr, Constraint)> {
        stage_ensure!(
            self.depth < self.options.max_call_depth,
            closure.lambda.body.span,
            "call depth exceeded {}",
            self.options.max_call_depth
        );
        let lambda = &closure.lambda;
        let mut scope = closure.scope.clone();
        if let Some(binding) = self_binding {
            if let Some(name) = &lambda.name {
                let recursive = StagedClosure {
                    binding: Some(binding.clone()),
                    ..closure.clone()
                };
                scope = scope.bind(name, SValue::Closure(recursive));
            }
            scope = scope.bind_residual(&binding.name, binding.id);
        }
        let own_name = self_binding.map(|b| b.name.as_str());
        if let Some(name) = def_name.filter(|name| Some(*name) != own_name) {
            let id = self.fresh_id();
            scope = scope.bind_residual(name, id);
        }

        let mut params = Vec::new();
        let mut values = Vec::with_capacity(lambda.arity());
        for (i, param) in lambda.params.iter().enumerate() {
            if let Some(Some(value)) = fixed.get(i) {
                values.push((param.name.clone(), value.clone()));
                continue;
            }
            let declared = match &param.ty {
                Some(ty) => Some(self.declared_type(ty, &closure.scope)?),
                None => None,
            };
            let constraint = hints
                .get(i)
                .cloned()
                .flatten()
                .or_else(|| declared.clone())
                .unwrap_or(Constraint::Any);
            let name = self.fresh_name(&param.name, &scope);
            let id = self.fresh_id();
            scope = scope.bind_residual(&name, id);
            values.push((param.name.clone(), SValue::later(constraint, Expr::var(&name))));
            params.push(Param {
                name,
                ty: declared.map(type_value),
            });
        }
        scope = scope.bind(ARGS, SValue::array(values.iter().map(|(_, v)| v.clone()).collect()));
        for (name, value) in values {
            scope = scope.bind(&name, value);
        }

        self.depth += 1;
        let staged = self.stage(&lambda.body, &scope);
        self.depth -= 1;
        let body = staged?;
        let result = body.constraint();
        let residual = self.residualize(&body, &scope)?;
        let lambda = Expr::lambda(Lambda {
            name: def_name.map(str::to_string),
            params,
            body: residual,
        });
        Ok((lambda, result))
    }
}

/// The receiver has a field `name` of its own, rather than the builtin method.
fn has_own_field(receiver: &SValue, name: &str) -> bool {
    match receiver {
        SValue::Now {
            value: Value::Object(fields),
            ..
        } => fields.contains_key(name),
        SValue::LaterObject { fields, .. } => fields.contains_key(name),
        SValue::Later { constraint, .. } => {
            let sequence = Constraint::or([Constraint::IsArray, Constraint::IsString]);
            !implies(constraint, &sequence)
        }
        _ => false,
    }
}
