//! Terse constructors for building Core ASTs by hand, mainly in tests.

use crate::ast::*;
use crate::value::Value;
use std::sync::Arc;

pub fn num(n: impl Into<f64>) -> Expr {
    Expr::literal(Literal::Number(n.into()))
}

pub fn string(s: impl Into<String>) -> Expr {
    Expr::literal(Literal::String(s.into()))
}

pub fn boolean(b: bool) -> Expr {
    Expr::literal(Literal::Bool(b))
}

pub fn null() -> Expr {
    Expr::literal(Literal::Null)
}

pub fn value(v: Value) -> Expr {
    Expr::new(ExprKind::Value(Box::new(v)))
}

pub fn var(name: impl Into<String>) -> Expr {
    Expr::var(name)
}

pub fn unary(op: UnOpKind, operand: Expr) -> Expr {
    Expr::new(ExprKind::Unary(ExprUnary {
        op,
        operand: Box::new(operand),
    }))
}

pub fn neg(operand: Expr) -> Expr {
    unary(UnOpKind::Neg, operand)
}

pub fn not(operand: Expr) -> Expr {
    unary(UnOpKind::Not, operand)
}

pub fn binary(op: BinOpKind, lhs: Expr, rhs: Expr) -> Expr {
    Expr::new(ExprKind::Binary(ExprBinary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }))
}

macro_rules! binary_builders {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name(lhs: Expr, rhs: Expr) -> Expr {
                binary(BinOpKind::$op, lhs, rhs)
            }
        )*
    };
}

binary_builders! {
    add => Add,
    sub => Sub,
    mul => Mul,
    div => Div,
    rem => Mod,
    eq => Eq,
    ne => Ne,
    lt => Lt,
    le => Le,
    gt => Gt,
    ge => Ge,
    and => And,
    or => Or,
}

pub fn if_else(cond: Expr, then: Expr, otherwise: Expr) -> Expr {
    Expr::new(ExprKind::If(ExprIf {
        cond: Box::new(cond),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
    }))
}

pub fn let_in(name: &str, init: Expr, body: Expr) -> Expr {
    Expr::let_in(Pattern::binding(name), init, body)
}

pub fn let_pat(pattern: Pattern, init: Expr, body: Expr) -> Expr {
    Expr::let_in(pattern, init, body)
}

fn params(names: &[&str]) -> Vec<Param> {
    names
        .iter()
        .map(|name| Param {
            name: name.to_string(),
            ty: None,
        })
        .collect()
}

pub fn lambda(names: &[&str], body: Expr) -> Expr {
    Expr::lambda(Lambda {
        name: None,
        params: params(names),
        body,
    })
}

/// A lambda that can call itself by `name`.
pub fn named_lambda(name: &str, names: &[&str], body: Expr) -> Expr {
    Expr::lambda(Lambda {
        name: Some(name.to_string()),
        params: params(names),
        body,
    })
}

pub fn typed_lambda(typed: Vec<(&str, Option<Expr>)>, body: Expr) -> Expr {
    Expr::new(ExprKind::Lambda(Arc::new(Lambda {
        name: None,
        params: typed
            .into_iter()
            .map(|(name, ty)| Param {
                name: name.to_string(),
                ty,
            })
            .collect(),
        body,
    })))
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::call(callee, args)
}

pub fn call_fn(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Expr::var(name), args)
}

pub fn object(fields: Vec<(&str, Expr)>) -> Expr {
    Expr::new(ExprKind::Object(
        fields
            .into_iter()
            .map(|(name, value)| ObjectEntry::Field {
                name: name.to_string(),
                value,
            })
            .collect(),
    ))
}

pub fn object_entries(entries: Vec<ObjectEntry>) -> Expr {
    Expr::new(ExprKind::Object(entries))
}

pub fn entry(name: &str, value: Expr) -> ObjectEntry {
    ObjectEntry::Field {
        name: name.to_string(),
        value,
    }
}

pub fn spread_entry(source: Expr) -> ObjectEntry {
    ObjectEntry::Spread(source)
}

pub fn array(items: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Array(items.into_iter().map(ArrayEntry::Item).collect()))
}

pub fn array_entries(entries: Vec<ArrayEntry>) -> Expr {
    Expr::new(ExprKind::Array(entries))
}

pub fn field(object: Expr, name: &str) -> Expr {
    Expr::field(object, name)
}

pub fn index(object: Expr, index: Expr) -> Expr {
    Expr::new(ExprKind::Index(ExprIndex {
        object: Box::new(object),
        index: Box::new(index),
    }))
}

pub fn template(parts: Vec<TemplatePart>) -> Expr {
    Expr::new(ExprKind::Template(parts))
}

pub fn text(s: &str) -> TemplatePart {
    TemplatePart::Text(s.to_string())
}

pub fn interp(e: Expr) -> TemplatePart {
    TemplatePart::Expr(e)
}

pub fn block(items: Vec<BlockItem>, result: Expr) -> Expr {
    Expr::new(ExprKind::Block(ExprBlock {
        items,
        result: Box::new(result),
    }))
}

pub fn let_item(name: &str, init: Expr) -> BlockItem {
    BlockItem::Let(StmtLet {
        pattern: Pattern::binding(name),
        init,
    })
}

pub fn expr_item(e: Expr) -> BlockItem {
    BlockItem::Expr(e)
}

pub fn import_item(names: &[&str], module: &str) -> BlockItem {
    BlockItem::Import(StmtImport {
        names: names.iter().map(|n| n.to_string()).collect(),
        module: module.to_string(),
    })
}

pub fn await_(e: Expr) -> Expr {
    Expr::new(ExprKind::Await(Box::new(e)))
}

pub fn throw(e: Expr) -> Expr {
    Expr::new(ExprKind::Throw(Box::new(e)))
}

pub fn match_(scrutinee: Expr, cases: Vec<MatchCase>) -> Expr {
    Expr::new(ExprKind::Match(ExprMatch {
        scrutinee: Box::new(scrutinee),
        cases,
    }))
}

pub fn case(pattern: Pattern, body: Expr) -> MatchCase {
    MatchCase {
        pattern,
        guard: None,
        body,
    }
}

pub fn guarded(pattern: Pattern, guard: Expr, body: Expr) -> MatchCase {
    MatchCase {
        pattern,
        guard: Some(guard),
        body,
    }
}

pub fn p_bind(name: &str) -> Pattern {
    Pattern::binding(name)
}

pub fn p_wild() -> Pattern {
    Pattern::Wildcard
}

pub fn p_lit(literal: Expr) -> Pattern {
    match literal.kind {
        ExprKind::Literal(l) => Pattern::Literal(l),
        _ => Pattern::Wildcard,
    }
}

pub fn p_object(fields: Vec<(&str, Pattern)>) -> Pattern {
    Pattern::Object(
        fields
            .into_iter()
            .map(|(name, pattern)| PatternField {
                name: name.to_string(),
                pattern,
            })
            .collect(),
    )
}

pub fn p_array(items: Vec<Pattern>, rest: Option<&str>) -> Pattern {
    Pattern::Array(PatternArray {
        items,
        rest: rest.map(str::to_string),
    })
}

pub fn p_type(ty: Expr, inner: Pattern) -> Pattern {
    Pattern::Type(PatternType {
        ty: Box::new(ty),
        inner: Box::new(inner),
    })
}

pub fn comptime(e: Expr) -> Expr {
    call_fn("comptime", vec![e])
}

pub fn runtime(e: Expr, name: &str) -> Expr {
    call_fn("runtime", vec![e, string(name)])
}

pub fn type_of(e: Expr) -> Expr {
    call_fn("typeOf", vec![e])
}

pub fn assert_type(v: Expr, ty: Expr) -> Expr {
    call_fn("assert", vec![v, ty])
}

pub fn assert_that(cond: Expr) -> Expr {
    call_fn("assert", vec![cond])
}

pub fn trust(v: Expr, ty: Expr) -> Expr {
    call_fn("trust", vec![v, ty])
}
