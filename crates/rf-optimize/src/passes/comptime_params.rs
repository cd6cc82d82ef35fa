//! Comptime sensitivity: which parameters of a function flow into a
//! position that must be known at compile time.
//!
//! A parameter is sensitive when a value derived from it reaches the argument
//! of `comptime(...)` or `typeOf(...)`, directly, through local `let`/`match`
//! bindings, through the `args` pseudo-array, or through a call to a locally
//! bound lambda whose own parameter is sensitive. Calls of such functions are
//! specialized per compile-time key.

use crate::usage::{free_vars, ARGS};
use itertools::Itertools;
use rf_core::ast::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::trace;

/// Special forms whose argument is evaluated at compile time.
pub const COMPTIME_FORMS: &[&str] = &["comptime", "typeOf"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComptimeParams {
    sensitive: Vec<bool>,
}

impl ComptimeParams {
    pub fn is_sensitive(&self, index: usize) -> bool {
        self.sensitive.get(index).copied().unwrap_or(false)
    }

    pub fn any(&self) -> bool {
        self.sensitive.iter().any(|s| *s)
    }

    pub fn positions(&self) -> Vec<usize> {
        self.sensitive.iter().positions(|s| *s).collect()
    }
}

/// Memoized per lambda allocation.
///
/// The memo keeps each analyzed lambda alive so its address cannot be reused
/// by another lambda while the analysis lives.
#[derive(Debug, Default)]
pub struct ComptimeAnalysis {
    memo: HashMap<usize, (Arc<Lambda>, ComptimeParams)>,
}

impl ComptimeAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(&mut self, lambda: &Arc<Lambda>) -> ComptimeParams {
        let key = Arc::as_ptr(lambda) as usize;
        if let Some((_, params)) = self.memo.get(&key) {
            return params.clone();
        }
        let params = analyze(lambda);
        if params.any() {
            trace!(
                "{} is comptime-sensitive in {:?}",
                lambda.name.as_deref().unwrap_or("<anonymous>"),
                params.positions()
            );
        }
        self.memo.insert(key, (lambda.clone(), params.clone()));
        params
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}

/// Uncached analysis of a single lambda.
pub fn analyze(lambda: &Lambda) -> ComptimeParams {
    let arity = lambda.arity();
    let mut taint = Taint {
        sensitive: vec![false; arity],
        scope: Vec::new(),
    };
    if let Some(name) = &lambda.name {
        taint.push(name.clone(), BTreeSet::new(), None);
    }
    taint.push(ARGS.to_string(), (0..arity).collect(), None);
    for (index, param) in lambda.params.iter().enumerate() {
        taint.push(param.name.clone(), BTreeSet::from([index]), None);
    }
    taint.walk(&lambda.body);
    ComptimeParams {
        sensitive: taint.sensitive,
    }
}

struct Tainted {
    name: String,
    sources: BTreeSet<usize>,
    /// Present when the name is bound to a lambda literal.
    callee: Option<ComptimeParams>,
}

struct Taint {
    sensitive: Vec<bool>,
    scope: Vec<Tainted>,
}

impl Taint {
    fn push(&mut self, name: String, sources: BTreeSet<usize>, callee: Option<ComptimeParams>) {
        self.scope.push(Tainted {
            name,
            sources,
            callee,
        });
    }

    fn lookup(&self, name: &str) -> Option<&Tainted> {
        self.scope.iter().rev().find(|t| t.name == name)
    }

    /// Parameters a value computed by `expr` may depend on.
    fn sources(&self, expr: &Expr) -> BTreeSet<usize> {
        if let ExprKind::Index(index) = &expr.kind {
            if let (Some(ARGS), Some(Literal::Number(n))) =
                (index.object.as_var(), index.index.as_literal())
            {
                if let Some(args) = self.lookup(ARGS) {
                    let wanted = *n as usize;
                    return args.sources.iter().copied().filter(|i| *i == wanted).collect();
                }
            }
        }
        free_vars(expr)
            .iter()
            .filter_map(|name| self.lookup(name))
            .flat_map(|t| t.sources.iter().copied())
            .collect()
    }

    fn mark(&mut self, sources: BTreeSet<usize>) {
        for index in sources {
            if let Some(slot) = self.sensitive.get_mut(index) {
                *slot = true;
            }
        }
    }

    fn bind_pattern(&mut self, pattern: &Pattern, sources: &BTreeSet<usize>, init: Option<&Expr>) {
        let callee = match (pattern, init.map(|e| &e.kind)) {
            (Pattern::Binding(_), Some(ExprKind::Lambda(lambda))) => Some(analyze(lambda)),
            _ => None,
        };
        for name in pattern.bound_names() {
            self.push(name, sources.clone(), callee.clone());
        }
    }

    fn walk(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Call(call) => {
                let callee = call.callee.as_var();
                if callee.is_some_and(|name| COMPTIME_FORMS.contains(&name)) {
                    for arg in &call.args {
                        let sources = self.sources(arg);
                        self.mark(sources);
                    }
                } else if let Some(params) =
                    callee.and_then(|name| self.lookup(name)).and_then(|t| t.callee.clone())
                {
                    for (index, arg) in call.args.iter().enumerate() {
                        if params.is_sensitive(index) {
                            let sources = self.sources(arg);
                            self.mark(sources);
                        }
                    }
                }
                self.walk(&call.callee);
                call.args.iter().for_each(|arg| self.walk(arg));
            }
            ExprKind::Let(l) => {
                visit::pattern_exprs(&l.pattern).into_iter().for_each(|e| self.walk(e));
                self.walk(&l.init);
                let sources = self.sources(&l.init);
                let mark = self.scope.len();
                self.bind_pattern(&l.pattern, &sources, Some(&l.init));
                self.walk(&l.body);
                self.scope.truncate(mark);
            }
            ExprKind::Block(block) => {
                let mark = self.scope.len();
                for item in &block.items {
                    match item {
                        BlockItem::Let(l) => {
                            visit::pattern_exprs(&l.pattern).into_iter().for_each(|e| self.walk(e));
                            self.walk(&l.init);
                            let sources = self.sources(&l.init);
                            self.bind_pattern(&l.pattern, &sources, Some(&l.init));
                        }
                        BlockItem::Expr(e) => self.walk(e),
                        BlockItem::Import(import) => {
                            for name in &import.names {
                                self.push(name.clone(), BTreeSet::new(), None);
                            }
                        }
                    }
                }
                self.walk(&block.result);
                self.scope.truncate(mark);
            }
            ExprKind::Match(m) => {
                self.walk(&m.scrutinee);
                let sources = self.sources(&m.scrutinee);
                for case in &m.cases {
                    visit::pattern_exprs(&case.pattern).into_iter().for_each(|e| self.walk(e));
                    let mark = self.scope.len();
                    self.bind_pattern(&case.pattern, &sources, None);
                    if let Some(guard) = &case.guard {
                        self.walk(guard);
                    }
                    self.walk(&case.body);
                    self.scope.truncate(mark);
                }
            }
            ExprKind::Lambda(lambda) => {
                for ty in lambda.params.iter().filter_map(|p| p.ty.as_ref()) {
                    self.walk(ty);
                }
                let mark = self.scope.len();
                let shadowed = lambda
                    .name
                    .iter()
                    .cloned()
                    .chain(lambda.param_names().map(String::from))
                    .chain(std::iter::once(ARGS.to_string()))
                    .collect::<Vec<_>>();
                for name in shadowed {
                    self.push(name, BTreeSet::new(), None);
                }
                self.walk(&lambda.body);
                self.scope.truncate(mark);
            }
            _ => {
                for child in visit::children(expr) {
                    self.walk(child);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rf_core::ast::build::*;

    fn lambda_of(expr: Expr) -> Arc<Lambda> {
        match expr.kind {
            ExprKind::Lambda(lambda) => lambda,
            _ => unreachable!(),
        }
    }

    #[test]
    fn memo_is_keyed_by_allocation() {
        let f = lambda_of(lambda(&["a", "b"], comptime(var("b"))));
        let mut analysis = ComptimeAnalysis::new();
        assert_eq!(analysis.params(&f).positions(), vec![1]);
        assert_eq!(analysis.params(&f).positions(), vec![1]);
        assert_eq!(analysis.len(), 1);
    }
}
