//! Staged evaluator
//!
//! Splits every expression into a compile-time result (`SValue::Now`) or a
//! residual expression with a constraint (`SValue::Later`). Closures are
//! deferred to their call sites; definitions for residual calls are staged
//! once per closure binding (and once per compile-time key for
//! comptime-sensitive functions) and emitted at the binding site.

mod bindings;
mod calls;
mod collections;
mod control;
mod expr;
mod ops;
mod residual;
mod scope;

pub use scope::Scope;

use crate::builtins::BuiltinRegistry;
use crate::imports::ImportTable;
use crate::interpreter::Interpreter;
use crate::options::StageOptions;
use crate::svalue::{Binding, SValue};
use rf_core::ast::visit::walk;
use rf_core::ast::{Expr, ExprKind, Literal, BlockItem};
use rf_core::diagnostics::Diagnostic;
use rf_core::span::Span;
use rf_core::{Constraint, Result, Value};
use rf_optimize::{free_vars, ComptimeAnalysis};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info_span};

/// Default residual name of `runtime(e)` without an explicit name.
pub const DEFAULT_INPUT: &str = "input";

#[derive(Debug, Clone)]
pub(crate) enum DefState {
    InProgress,
    Done { lambda: Expr, result: Constraint },
}

/// One compile-time key component per parameter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SpecArg {
    Value(Value),
    Type(Constraint),
    Dynamic,
}

#[derive(Debug, Clone)]
pub(crate) struct Specialization {
    key: Vec<SpecArg>,
    name: String,
    state: DefState,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Definitions {
    generic: Option<DefState>,
    specs: Vec<Specialization>,
}

/// Result of staging a whole program.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub residual: Expr,
    pub result: SValue,
    pub diagnostics: Vec<Diagnostic>,
    pub has_errors: bool,
    pub specializations: usize,
}

impl StageOutcome {
    /// The compile-time value, when the whole program reduced to one.
    pub fn value(&self) -> Option<&Value> {
        self.result.as_value()
    }

    pub fn constraint(&self) -> Constraint {
        self.result.constraint()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }
}

pub(crate) struct Stager {
    registry: Arc<BuiltinRegistry>,
    imports: Arc<ImportTable>,
    options: StageOptions,
    analysis: ComptimeAnalysis,
    interpreter: Interpreter,
    diagnostics: Vec<Diagnostic>,
    next_id: u32,
    depth: usize,
    /// Branches being staged whose selection is only known at runtime.
    runtime_branches: usize,
    /// Closures being invoked in place, with `runtime_branches` at entry.
    inlined: Vec<(u32, usize)>,
    /// Names residual code may not bind: runtime inputs, imports, builtins.
    reserved: HashSet<String>,
    definitions: HashMap<u32, Definitions>,
    /// Inline lambda residuals of closures without a visible binding.
    anonymous: HashMap<u32, Expr>,
    /// Bindings made up for named closures called without a visible binding.
    self_bindings: HashMap<u32, Binding>,
    specializations: usize,
}

impl Stager {
    pub(crate) fn new(
        registry: Arc<BuiltinRegistry>,
        imports: Arc<ImportTable>,
        options: StageOptions,
    ) -> Self {
        let interpreter = Interpreter::new(registry.clone())
            .with_imports(imports.clone())
            .with_options(&options);
        let reserved = registry.names().into_iter().map(String::from).collect();
        Self {
            registry,
            imports,
            options,
            analysis: ComptimeAnalysis::new(),
            interpreter,
            diagnostics: Vec::new(),
            next_id: 0,
            depth: 0,
            runtime_branches: 0,
            inlined: Vec::new(),
            reserved,
            definitions: HashMap::new(),
            anonymous: HashMap::new(),
            self_bindings: HashMap::new(),
            specializations: 0,
        }
    }

    pub(crate) fn stage_program(mut self, expr: &Expr) -> Result<StageOutcome> {
        self.reserve_inputs(expr);
        let scope = Scope::new();
        let result = self.stage(expr, &scope)?;
        let residual = self.residualize(&result, &scope)?;
        debug!(
            "staged program: {} specialization(s), {} closure analyses",
            self.specializations,
            self.analysis.len()
        );
        let has_errors = self.diagnostics.iter().any(Diagnostic::is_error);
        Ok(StageOutcome {
            residual,
            result,
            diagnostics: self.diagnostics,
            has_errors,
            specializations: self.specializations,
        })
    }

    /// Free names of the program and the names of runtime inputs stay
    /// unbound in the residual.
    fn reserve_inputs(&mut self, expr: &Expr) {
        self.reserved.extend(free_vars(expr));
        walk(expr, &mut |e| match &e.kind {
            ExprKind::Call(call) if call.callee.as_var() == Some("runtime") => {
                let name = match call.args.get(1).and_then(Expr::as_literal) {
                    Some(Literal::String(name)) => name.clone(),
                    _ => DEFAULT_INPUT.to_string(),
                };
                self.reserved.insert(name);
            }
            ExprKind::Block(block) => {
                for item in &block.items {
                    if let BlockItem::Import(import) = item {
                        self.reserved.extend(import.names.iter().cloned());
                    }
                }
            }
            _ => {}
        });
    }

    pub(crate) fn fresh_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// A residual name based on `base` that nothing in `scope` binds.
    pub(crate) fn fresh_name(&self, base: &str, scope: &Scope) -> String {
        let taken = |name: &str| scope.has_residual_name(name) || self.reserved.contains(name);
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{}_{}", base, n))
            .find(|name| !taken(name))
            .unwrap_or_else(|| base.to_string())
    }

    /// Run `f` as the staging of a branch chosen at runtime when `runtime` holds.
    pub(crate) fn in_branch<T>(
        &mut self,
        runtime: bool,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if !runtime {
            return f(self);
        }
        self.runtime_branches += 1;
        let result = f(self);
        self.runtime_branches -= 1;
        result
    }

    /// `closure` is already being invoked in place further up, and a branch
    /// chosen at runtime lies in between: unrolling again may never stop.
    pub(crate) fn recurses_at_runtime(&self, closure_id: u32) -> bool {
        self.inlined
            .iter()
            .any(|&(id, branches)| id == closure_id && self.runtime_branches > branches)
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>, span: Option<Span>) {
        let diagnostic = Diagnostic::warning(message).with_span(span);
        debug!("warning: {}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }
}

/// Entry point: owns the registry, imports and options shared by every pass.
#[derive(Debug, Clone)]
pub struct StagingOrchestrator {
    registry: Arc<BuiltinRegistry>,
    imports: Arc<ImportTable>,
    options: StageOptions,
}

impl StagingOrchestrator {
    pub fn new(registry: Arc<BuiltinRegistry>) -> Self {
        Self {
            registry,
            imports: Arc::new(ImportTable::new()),
            options: StageOptions::default(),
        }
    }

    pub fn with_imports(mut self, imports: ImportTable) -> Self {
        self.imports = Arc::new(imports);
        self
    }

    pub fn with_options(mut self, options: StageOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &StageOptions {
        &self.options
    }

    pub fn stage(&self, expr: &Expr) -> Result<StageOutcome> {
        let _span = info_span!("stage").entered();
        Stager::new(self.registry.clone(), self.imports.clone(), self.options.clone())
            .stage_program(expr)
    }

    /// Evaluate directly, without staging.
    pub fn run(&self, expr: &Expr) -> Result<Value> {
        let _span = info_span!("run").entered();
        Interpreter::new(self.registry.clone())
            .with_imports(self.imports.clone())
            .with_options(&self.options)
            .run(expr)
    }
}
