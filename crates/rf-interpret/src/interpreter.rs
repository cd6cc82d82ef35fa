//! Direct evaluation of core programs.
//!
//! Shares operators, projections and pattern matching with the staged
//! evaluator, and serves both as the `run` command and as the reference the
//! staged evaluator agrees with on runtime-free programs.

use crate::builtins::{Apply, BuiltinRegistry};
use crate::error::{assertion_error_at, staging_error_at};
use crate::imports::{ImportTable, ImportedBinding};
use crate::operators;
use crate::options::StageOptions;
use rf_core::ast::*;
use rf_core::{type_bail, Closure, Constraint, Env, Error, Result, Value};
use rf_optimize::ARGS;
use rf_typing::{constraint_of, satisfies};
use std::sync::Arc;

pub struct Interpreter {
    registry: Arc<BuiltinRegistry>,
    imports: Arc<ImportTable>,
    max_depth: usize,
    depth: usize,
}

impl Interpreter {
    pub fn new(registry: Arc<BuiltinRegistry>) -> Self {
        Self {
            registry,
            imports: Arc::new(ImportTable::new()),
            max_depth: StageOptions::default().max_call_depth,
            depth: 0,
        }
    }

    pub fn with_imports(mut self, imports: Arc<ImportTable>) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_options(mut self, options: &StageOptions) -> Self {
        self.max_depth = options.max_call_depth;
        self
    }

    pub fn run(&mut self, expr: &Expr) -> Result<Value> {
        self.eval(expr, &Env::new())
    }

    pub fn eval(&mut self, expr: &Expr, env: &Env<Value>) -> Result<Value> {
        self.eval_kind(expr, env).map_err(|e| e.with_span(expr.span))
    }

    fn eval_kind(&mut self, expr: &Expr, env: &Env<Value>) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(l) => Ok(l.to_value()),
            ExprKind::Value(v) => Ok(v.as_ref().clone()),
            ExprKind::Var(name) => self.lookup(name, env),
            ExprKind::Unary(u) => {
                let operand = self.eval(&u.operand, env)?;
                operators::unary(u.op, &operand)
            }
            ExprKind::Binary(b) if b.op.is_logical() => {
                let lhs = operators::condition(&self.eval(&b.lhs, env)?)?;
                if lhs == (b.op == BinOpKind::Or) {
                    return Ok(Value::Bool(lhs));
                }
                Ok(Value::Bool(operators::condition(&self.eval(&b.rhs, env)?)?))
            }
            ExprKind::Binary(b) => {
                let lhs = self.eval(&b.lhs, env)?;
                let rhs = self.eval(&b.rhs, env)?;
                operators::binary(b.op, &lhs, &rhs)
            }
            ExprKind::If(i) => {
                if operators::condition(&self.eval(&i.cond, env)?)? {
                    self.eval(&i.then, env)
                } else {
                    self.eval(&i.otherwise, env)
                }
            }
            ExprKind::Let(l) => {
                let value = self.eval(&l.init, env)?;
                let env = self.bind_pattern(&l.pattern, &value, env)?;
                self.eval(&l.body, &env)
            }
            ExprKind::Lambda(lambda) => Ok(Value::Closure(Closure::new(lambda.clone(), env.clone()))),
            ExprKind::Call(call) => self.eval_call(call, env),
            ExprKind::Object(entries) => {
                let mut fields = indexmap::IndexMap::new();
                for entry in entries {
                    match entry {
                        ObjectEntry::Field { name, value } => {
                            fields.insert(name.clone(), self.eval(value, env)?);
                        }
                        ObjectEntry::Spread(source) => match self.eval(source, env)? {
                            Value::Object(source) => fields.extend(source),
                            other => type_bail!("cannot spread {} into an object", other.repr()),
                        },
                    }
                }
                Ok(Value::Object(fields))
            }
            ExprKind::Array(entries) => {
                let mut items = Vec::new();
                for entry in entries {
                    match entry {
                        ArrayEntry::Item(item) => items.push(self.eval(item, env)?),
                        ArrayEntry::Spread(source) => match self.eval(source, env)? {
                            Value::Array(source) => items.extend(source),
                            other => type_bail!("cannot spread {} into an array", other.repr()),
                        },
                    }
                }
                Ok(Value::Array(items))
            }
            ExprKind::Field(f) => operators::field(&self.eval(&f.object, env)?, &f.name),
            ExprKind::Index(i) => {
                let object = self.eval(&i.object, env)?;
                let key = self.eval(&i.index, env)?;
                operators::index(&object, &key)
            }
            ExprKind::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expr(e) => {
                            out.push_str(&operators::template_piece(&self.eval(e, env)?))
                        }
                    }
                }
                Ok(Value::String(out))
            }
            ExprKind::Block(block) => {
                let mut env = env.clone();
                for item in &block.items {
                    match item {
                        BlockItem::Let(l) => {
                            let value = self.eval(&l.init, &env)?;
                            env = self.bind_pattern(&l.pattern, &value, &env)?;
                        }
                        BlockItem::Expr(e) => {
                            self.eval(e, &env)?;
                        }
                        BlockItem::Import(import) => env = self.import(import, &env)?,
                    }
                }
                self.eval(&block.result, &env)
            }
            ExprKind::Await(inner) => self.eval(inner, env),
            ExprKind::Throw(inner) => Err(Error::Thrown {
                value: self.eval(inner, env)?,
            }),
            ExprKind::Match(m) => {
                let subject = self.eval(&m.scrutinee, env)?;
                for case in &m.cases {
                    let Some(bindings) = self.match_pattern(&subject, &case.pattern, env)? else {
                        continue;
                    };
                    let env = bindings
                        .into_iter()
                        .fold(env.clone(), |env, (name, value)| env.bind(name, value));
                    if let Some(guard) = &case.guard {
                        if !operators::condition(&self.eval(guard, &env)?)? {
                            continue;
                        }
                    }
                    return self.eval(&case.body, &env);
                }
                type_bail!("no match case accepts {}", subject.repr())
            }
        }
    }

    fn lookup(&self, name: &str, env: &Env<Value>) -> Result<Value> {
        if let Some(value) = env.lookup(name) {
            return Ok(value.clone());
        }
        match self.registry.lookup(name) {
            Some(value) => Ok(value),
            None => type_bail!("unbound variable `{}`", name),
        }
    }

    fn eval_type(&mut self, expr: &Expr, env: &Env<Value>) -> Result<Constraint> {
        match self.eval(expr, env)? {
            Value::Type(c) => Ok(*c),
            other => type_bail!("{} is not a type", other.repr()),
        }
    }

    fn match_pattern(
        &mut self,
        value: &Value,
        pattern: &Pattern,
        env: &Env<Value>,
    ) -> Result<Option<Vec<(String, Value)>>> {
        operators::match_pattern(value, pattern, &mut |ty: &Expr| self.eval_type(ty, env))
    }

    fn bind_pattern(&mut self, pattern: &Pattern, value: &Value, env: &Env<Value>) -> Result<Env<Value>> {
        match self.match_pattern(value, pattern, env)? {
            Some(bindings) => Ok(bindings
                .into_iter()
                .fold(env.clone(), |env, (name, value)| env.bind(name, value))),
            None => type_bail!("{} does not match pattern {}", value.repr(), pattern),
        }
    }

    fn import(&mut self, import: &StmtImport, env: &Env<Value>) -> Result<Env<Value>> {
        let mut env = env.clone();
        for name in &import.names {
            match self.imports.resolve(&import.module, name) {
                Some(ImportedBinding::Value(value)) => env = env.bind(name.clone(), value.clone()),
                Some(ImportedBinding::Declared(c)) => type_bail!(
                    "`{}` from \"{}\" is only declared ({}); it has no value to run with",
                    name,
                    import.module,
                    c
                ),
                None => type_bail!("module \"{}\" has no export `{}`", import.module, name),
            }
        }
        Ok(env)
    }

    fn eval_call(&mut self, call: &ExprCall, env: &Env<Value>) -> Result<Value> {
        if let Some(name) = call.callee.as_var().filter(|name| !env.contains(name)) {
            if let Some(result) = self.special_form(name, &call.args, env)? {
                return Ok(result);
            }
        }
        if let ExprKind::Field(f) = &call.callee.kind {
            let receiver = self.eval(&f.object, env)?;
            let is_own_field = matches!(&receiver, Value::Object(fields) if fields.contains_key(&f.name));
            if let (false, Some(method)) = (is_own_field, self.registry.method(&f.name).cloned()) {
                let rest = self.eval_args(&call.args, env)?;
                let args = method.from_method_args(receiver, rest);
                return self.apply(&Value::Builtin(method.name.clone()), args);
            }
            let callee = operators::field(&receiver, &f.name)?;
            let args = self.eval_args(&call.args, env)?;
            return self.apply(&callee, args);
        }
        let callee = self.eval(&call.callee, env)?;
        let args = self.eval_args(&call.args, env)?;
        self.apply(&callee, args)
    }

    fn eval_args(&mut self, args: &[Expr], env: &Env<Value>) -> Result<Vec<Value>> {
        args.iter().map(|a| self.eval(a, env)).collect()
    }

    /// `comptime`, `runtime`, `typeOf`, `assert` and `trust`.
    fn special_form(&mut self, name: &str, args: &[Expr], env: &Env<Value>) -> Result<Option<Value>> {
        let value = match (name, args) {
            ("comptime", [e]) | ("runtime", [e]) | ("runtime", [e, _]) => self.eval(e, env)?,
            ("typeOf", [e]) => Value::ty(constraint_of(&self.eval(e, env)?)),
            ("trust", [e, ty]) => {
                self.eval_type(ty, env)?;
                self.eval(e, env)?
            }
            ("assert", [cond]) => match self.eval(cond, env)? {
                Value::Bool(true) => Value::Bool(true),
                Value::Bool(false) => {
                    return Err(assertion_error_at(format!("{} is false", cond), cond.span))
                }
                other => type_bail!("assert condition must be a boolean, got {}", other.repr()),
            },
            ("assert", [e, ty]) => {
                let value = self.eval(e, env)?;
                let c = self.eval_type(ty, env)?;
                if !satisfies(&value, &c) {
                    return Err(assertion_error_at(
                        format!("{} does not satisfy {}", value.repr(), c),
                        e.span,
                    ));
                }
                value
            }
            ("comptime" | "runtime" | "typeOf" | "trust" | "assert", _) => {
                type_bail!("wrong number of arguments to `{}`", name)
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    pub fn apply(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::Closure(closure) => {
                if self.depth >= self.max_depth {
                    return Err(staging_error_at(
                        format!("call depth exceeded {}", self.max_depth),
                        closure.lambda.body.span,
                    ));
                }
                self.depth += 1;
                let result = self.call_closure(closure, args);
                self.depth -= 1;
                result
            }
            Value::Builtin(name) => {
                let Some(builtin) = self.registry.get(name).cloned() else {
                    type_bail!("unknown builtin `{}`", name)
                };
                let constraints: Vec<Constraint> = args.iter().map(constraint_of).collect();
                builtin.check_args(&constraints)?;
                builtin.run(self, &args)
            }
            other => type_bail!("{} is not a function", other.repr()),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> Result<Value> {
        let lambda = &closure.lambda;
        if args.len() != lambda.arity() {
            type_bail!(
                "{} expects {} argument(s), got {}",
                Value::Closure(closure.clone()),
                lambda.arity(),
                args.len()
            );
        }
        let mut env = closure.env.clone();
        if let Some(name) = &lambda.name {
            env = env.bind(name.clone(), Value::Closure(closure.clone()));
        }
        for (param, arg) in lambda.params.iter().zip(&args) {
            if let Some(ty) = &param.ty {
                let c = self.eval_type(ty, &closure.env)?;
                if !satisfies(arg, &c) {
                    type_bail!("parameter `{}` expects {}, got {}", param.name, c, arg.repr());
                }
            }
        }
        env = env.bind(ARGS, Value::Array(args.clone()));
        for (param, arg) in lambda.params.iter().zip(args) {
            env = env.bind(param.name.clone(), arg);
        }
        self.eval(&lambda.body, &env)
    }
}

impl Apply for Interpreter {
    fn apply(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value> {
        Interpreter::apply(self, callee, args)
    }
}
