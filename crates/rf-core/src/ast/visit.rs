use crate::ast::*;

/// Direct sub-expressions of `expr`, in evaluation order.
pub fn children(expr: &Expr) -> Vec<&Expr> {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Var(_) | ExprKind::Value(_) => Vec::new(),
        ExprKind::Unary(u) => vec![&*u.operand],
        ExprKind::Binary(b) => vec![&*b.lhs, &*b.rhs],
        ExprKind::If(i) => vec![&*i.cond, &*i.then, &*i.otherwise],
        ExprKind::Let(l) => {
            let mut out = pattern_exprs(&l.pattern);
            out.push(&l.init);
            out.push(&l.body);
            out
        }
        ExprKind::Lambda(lambda) => {
            let mut out: Vec<&Expr> = lambda.params.iter().filter_map(|p| p.ty.as_ref()).collect();
            out.push(&lambda.body);
            out
        }
        ExprKind::Call(c) => std::iter::once(c.callee.as_ref()).chain(&c.args).collect(),
        ExprKind::Object(entries) => entries
            .iter()
            .map(|e| match e {
                ObjectEntry::Field { value, .. } => value,
                ObjectEntry::Spread(e) => e,
            })
            .collect(),
        ExprKind::Array(items) => items
            .iter()
            .map(|e| match e {
                ArrayEntry::Item(e) | ArrayEntry::Spread(e) => e,
            })
            .collect(),
        ExprKind::Field(field) => vec![&*field.object],
        ExprKind::Index(index) => vec![&*index.object, &*index.index],
        ExprKind::Template(parts) => parts
            .iter()
            .filter_map(|p| match p {
                TemplatePart::Expr(e) => Some(e),
                TemplatePart::Text(_) => None,
            })
            .collect(),
        ExprKind::Block(block) => {
            let mut out = Vec::new();
            for item in &block.items {
                match item {
                    BlockItem::Let(l) => {
                        out.extend(pattern_exprs(&l.pattern));
                        out.push(&l.init);
                    }
                    BlockItem::Expr(e) => out.push(e),
                    BlockItem::Import(_) => {}
                }
            }
            out.push(&block.result);
            out
        }
        ExprKind::Await(e) | ExprKind::Throw(e) => vec![e.as_ref()],
        ExprKind::Match(m) => {
            let mut out = vec![m.scrutinee.as_ref()];
            for case in &m.cases {
                out.extend(pattern_exprs(&case.pattern));
                out.extend(case.guard.iter());
                out.push(&case.body);
            }
            out
        }
    }
}

/// Type expressions nested in a pattern.
pub fn pattern_exprs(pattern: &Pattern) -> Vec<&Expr> {
    match pattern {
        Pattern::Wildcard | Pattern::Binding(_) | Pattern::Literal(_) => Vec::new(),
        Pattern::Object(fields) => fields.iter().flat_map(|f| pattern_exprs(&f.pattern)).collect(),
        Pattern::Array(array) => array.items.iter().flat_map(pattern_exprs).collect(),
        Pattern::Type(ty) => {
            let mut out = vec![ty.ty.as_ref()];
            out.extend(pattern_exprs(&ty.inner));
            out
        }
    }
}

/// Pre-order walk over every expression node.
pub fn walk<'a>(expr: &'a Expr, f: &mut impl FnMut(&'a Expr)) {
    f(expr);
    for child in children(expr) {
        walk(child, f);
    }
}

/// True if any node satisfies `pred`.
pub fn any_expr(expr: &Expr, pred: &mut impl FnMut(&Expr) -> bool) -> bool {
    pred(expr) || children(expr).into_iter().any(|c| any_expr(c, pred))
}

/// Number of nodes satisfying `pred`.
pub fn count_exprs(expr: &Expr, mut pred: impl FnMut(&Expr) -> bool) -> usize {
    let mut count = 0;
    walk(expr, &mut |e| {
        if pred(e) {
            count += 1;
        }
    });
    count
}
