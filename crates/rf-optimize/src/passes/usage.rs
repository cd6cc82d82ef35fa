//! Scope-aware variable usage over the core AST.

use rf_core::ast::*;
use std::collections::BTreeSet;

/// Name of the pseudo-array bound in every function body.
pub const ARGS: &str = "args";

/// Calls a callback for every variable occurrence not bound inside the walked
/// expression. The flag tells whether the occurrence sits inside a lambda.
struct FreeWalker<'f, F: FnMut(&str, bool)> {
    bound: Vec<String>,
    on_free: &'f mut F,
}

impl<F: FnMut(&str, bool)> FreeWalker<'_, F> {
    fn walk(&mut self, expr: &Expr, in_lambda: bool) {
        match &expr.kind {
            ExprKind::Var(name) => {
                if !self.bound.iter().any(|b| b == name) {
                    (self.on_free)(name, in_lambda);
                }
            }
            ExprKind::Let(l) => {
                self.walk_patterns(&l.pattern, in_lambda);
                self.walk(&l.init, in_lambda);
                let mark = self.bind(l.pattern.bound_names());
                self.walk(&l.body, in_lambda);
                self.bound.truncate(mark);
            }
            ExprKind::Lambda(lambda) => {
                for ty in lambda.params.iter().filter_map(|p| p.ty.as_ref()) {
                    self.walk(ty, in_lambda);
                }
                let mut names: Vec<String> = lambda.name.iter().cloned().collect();
                names.extend(lambda.param_names().map(String::from));
                names.push(ARGS.to_string());
                let mark = self.bind(names);
                self.walk(&lambda.body, true);
                self.bound.truncate(mark);
            }
            ExprKind::Block(block) => {
                let mark = self.bound.len();
                for item in &block.items {
                    match item {
                        BlockItem::Let(l) => {
                            self.walk_patterns(&l.pattern, in_lambda);
                            self.walk(&l.init, in_lambda);
                            self.bind(l.pattern.bound_names());
                        }
                        BlockItem::Expr(e) => self.walk(e, in_lambda),
                        BlockItem::Import(import) => {
                            self.bind(import.names.clone());
                        }
                    }
                }
                self.walk(&block.result, in_lambda);
                self.bound.truncate(mark);
            }
            ExprKind::Match(m) => {
                self.walk(&m.scrutinee, in_lambda);
                for case in &m.cases {
                    self.walk_patterns(&case.pattern, in_lambda);
                    let mark = self.bind(case.pattern.bound_names());
                    if let Some(guard) = &case.guard {
                        self.walk(guard, in_lambda);
                    }
                    self.walk(&case.body, in_lambda);
                    self.bound.truncate(mark);
                }
            }
            _ => {
                for child in visit::children(expr) {
                    self.walk(child, in_lambda);
                }
            }
        }
    }

    fn walk_patterns(&mut self, pattern: &Pattern, in_lambda: bool) {
        for ty in visit::pattern_exprs(pattern) {
            self.walk(ty, in_lambda);
        }
    }

    /// Pushes names and returns the previous depth.
    fn bind(&mut self, names: Vec<String>) -> usize {
        let mark = self.bound.len();
        self.bound.extend(names);
        mark
    }
}

fn for_each_free(expr: &Expr, mut f: impl FnMut(&str, bool)) {
    let mut walker = FreeWalker {
        bound: Vec::new(),
        on_free: &mut f,
    };
    walker.walk(expr, false);
}

/// Names referenced by `expr` that it does not bind itself.
pub fn free_vars(expr: &Expr) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for_each_free(expr, |name, _| {
        out.insert(name.to_string());
    });
    out
}

/// Weighted number of free occurrences of `name`.
///
/// An occurrence inside a lambda counts twice: the lambda may run many times,
/// so a value referenced there is never cheaper to inline than to name.
pub fn count_uses(expr: &Expr, name: &str) -> usize {
    let mut count = 0;
    for_each_free(expr, |var, in_lambda| {
        if var == name {
            count += if in_lambda { 2 } else { 1 };
        }
    });
    count
}

pub fn mentions(expr: &Expr, name: &str) -> bool {
    let mut found = false;
    for_each_free(expr, |var, _| found |= var == name);
    found
}

/// Cheap enough to duplicate in residual code.
pub fn is_trivial(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(_) | ExprKind::Var(_))
}

/// Dropping the expression cannot change observable behavior.
pub fn is_pure(expr: &Expr) -> bool {
    !visit::any_expr(expr, &mut |e| match &e.kind {
        ExprKind::Throw(_) | ExprKind::Await(_) => true,
        ExprKind::Call(call) => call.callee.as_var() == Some("assert"),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rf_core::ast::build::*;

    #[test]
    fn lambda_uses_weigh_double() {
        let expr = add(var("x"), call_fn("map", vec![var("xs"), lambda(&["y"], add(var("y"), var("x")))]));
        assert_eq!(count_uses(&expr, "x"), 3);
        assert_eq!(count_uses(&expr, "y"), 0);
    }

    #[test]
    fn shadowed_names_are_not_free() {
        let expr = let_in("x", num(1.0), add(var("x"), var("y")));
        assert_eq!(
            free_vars(&expr).into_iter().collect::<Vec<_>>(),
            vec!["y".to_string()]
        );
    }
}
