//! Builtin registry - the functions every program can call without
//! defining them, with their signatures and evaluators.

pub mod basic;
pub mod higher_order;
pub mod reflect;

use crate::svalue::SValue;
use indexmap::IndexMap;
use rf_core::{type_bail, Constraint, Result, Value};
use rf_typing::solver::erase_vars;
use rf_typing::{disjoint, Bindings};
use std::collections::HashMap;
use std::sync::Arc;

/// Calls back into the pure evaluator from higher-order builtins.
pub trait Apply {
    fn apply(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value>;
}

/// What a staged builtin may do with the staged evaluator.
pub trait StagingContext {
    /// Call a staged function value with staged arguments.
    fn invoke(&mut self, callee: &SValue, args: Vec<SValue>) -> Result<SValue>;
    fn warn(&mut self, message: String);
}

pub type PureFn = fn(&mut dyn Apply, &[Value]) -> Result<Value>;

/// `Ok(None)` asks the caller to emit a residual call instead.
pub type StagedFn = fn(&mut dyn StagingContext, &[SValue]) -> Result<Option<SValue>>;

#[derive(Clone, Copy)]
pub enum BuiltinEval {
    Pure(PureFn),
    Staged { run: PureFn, stage: StagedFn },
}

/// How the result constraint follows from the argument constraints.
#[derive(Clone)]
pub enum ResultRule {
    /// Instantiated with the variables bound from the parameters.
    Pattern(Constraint),
    Compute(fn(&[Constraint]) -> Constraint),
}

#[derive(Clone)]
pub struct Builtin {
    pub name: String,
    pub params: Vec<Constraint>,
    pub result: ResultRule,
    pub eval: BuiltinEval,
    /// Every argument must be known at compile time.
    pub comptime_only: bool,
    /// Residual calls use `receiver.method(rest)` when set.
    pub runtime_method: Option<&'static str>,
    /// Parameter index of each method argument after the receiver, when
    /// the method takes them in another order.
    pub method_order: Option<&'static [usize]>,
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("comptime_only", &self.comptime_only)
            .finish()
    }
}

impl Builtin {
    pub fn pure(
        name: &str,
        params: Vec<Constraint>,
        result: ResultRule,
        run: PureFn,
    ) -> Self {
        Self {
            name: name.to_string(),
            params,
            result,
            eval: BuiltinEval::Pure(run),
            comptime_only: false,
            runtime_method: None,
            method_order: None,
        }
    }

    pub fn staged(
        name: &str,
        params: Vec<Constraint>,
        result: ResultRule,
        run: PureFn,
        stage: StagedFn,
    ) -> Self {
        Self {
            eval: BuiltinEval::Staged { run, stage },
            ..Self::pure(name, params, result, run)
        }
    }

    pub fn comptime_only(mut self) -> Self {
        self.comptime_only = true;
        self
    }

    pub fn runtime_method(mut self, method: &'static str) -> Self {
        self.runtime_method = Some(method);
        self
    }

    pub fn method_order(mut self, order: &'static [usize]) -> Self {
        self.method_order = Some(order);
        self
    }

    /// The arguments of `receiver.method(rest)` in parameter order.
    pub fn from_method_args<T>(&self, receiver: T, rest: Vec<T>) -> Vec<T> {
        let order = match self.method_order {
            Some(order) if order.len() == rest.len() => order,
            _ => return std::iter::once(receiver).chain(rest).collect(),
        };
        let mut slots: Vec<Option<T>> = std::iter::once(Some(receiver))
            .chain(rest.iter().map(|_| None))
            .collect();
        for (&index, arg) in order.iter().zip(rest) {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(arg);
            }
        }
        slots.into_iter().flatten().collect()
    }

    /// The arguments after the receiver, in the order the method takes them.
    pub fn method_args<T: Clone>(&self, args: &[T]) -> Vec<T> {
        match self.method_order {
            Some(order) => order.iter().filter_map(|&i| args.get(i).cloned()).collect(),
            None => args.iter().skip(1).cloned().collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Arity and parameter compatibility; only provable mismatches fail.
    pub fn check_args(&self, args: &[Constraint]) -> Result<()> {
        if args.len() != self.arity() {
            type_bail!(
                "`{}` expects {} argument(s), got {}",
                self.name,
                self.arity(),
                args.len()
            );
        }
        for (i, (param, arg)) in self.params.iter().zip(args).enumerate() {
            let expected = erase_vars(param);
            if !arg.is_never() && disjoint(arg, &expected) {
                type_bail!(
                    "argument {} of `{}` must be {}, got {}",
                    i + 1,
                    self.name,
                    expected,
                    arg
                );
            }
        }
        Ok(())
    }

    pub fn result_constraint(&self, args: &[Constraint]) -> Constraint {
        match &self.result {
            ResultRule::Pattern(pattern) => {
                let mut bindings = Bindings::new();
                for (param, arg) in self.params.iter().zip(args) {
                    bindings.bind(param, arg);
                }
                bindings.instantiate(pattern)
            }
            ResultRule::Compute(compute) => compute(args),
        }
    }

    pub fn run(&self, apply: &mut dyn Apply, args: &[Value]) -> Result<Value> {
        match self.eval {
            BuiltinEval::Pure(run) | BuiltinEval::Staged { run, .. } => run(apply, args),
        }
    }
}

/// The `index`-th argument; arity is checked before evaluators run.
pub(crate) fn arg(args: &[Value], index: usize) -> Result<&Value> {
    match args.get(index) {
        Some(value) => Ok(value),
        None => type_bail!("missing argument {}", index + 1),
    }
}

pub(crate) fn number_arg(args: &[Value], index: usize) -> Result<f64> {
    match arg(args, index)? {
        Value::Number(n) => Ok(*n),
        other => type_bail!("expected a number, got {}", other.repr()),
    }
}

pub(crate) fn array_arg(args: &[Value], index: usize) -> Result<&[Value]> {
    match arg(args, index)? {
        Value::Array(items) => Ok(items),
        other => type_bail!("expected an array, got {}", other.repr()),
    }
}

pub(crate) fn type_arg(args: &[Value], index: usize) -> Result<&Constraint> {
    match arg(args, index)? {
        Value::Type(c) => Ok(c),
        other => type_bail!("expected a type, got {}", other.repr()),
    }
}

/// Builtins and named constants, built once and shared by both evaluators.
#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    builtins: HashMap<String, Arc<Builtin>>,
    constants: IndexMap<String, Value>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every builtin of the language.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        basic::register_all(&mut registry);
        higher_order::register_all(&mut registry);
        reflect::register_all(&mut registry);
        registry
    }

    pub fn register(&mut self, builtin: Builtin) {
        self.builtins
            .insert(builtin.name.clone(), Arc::new(builtin));
    }

    pub fn register_constant(&mut self, name: &str, value: Value) {
        self.constants.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Builtin>> {
        self.builtins.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    /// The builtin reachable as runtime method `method`.
    pub fn method(&self, method: &str) -> Option<&Arc<Builtin>> {
        self.builtins
            .values()
            .find(|b| b.runtime_method == Some(method))
    }

    /// A name the registry resolves, as a value.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.constant(name)
            .cloned()
            .or_else(|| self.get(name).map(|_| Value::Builtin(name.to_string())))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .builtins
            .keys()
            .chain(self.constants.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }
}
