//! Compact source-like rendering of expressions, for logs, errors and tests.

use crate::ast::*;
use crate::value::{fmt_number, quote, Value};
use itertools::Itertools;
use std::fmt::{Display, Formatter, Result};

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Literal::Number(n) => write!(f, "{}", fmt_number(*n)),
            Literal::String(s) => write!(f, "{}", quote(s)),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match &self.kind {
            ExprKind::Literal(l) => write!(f, "{}", l),
            ExprKind::Var(name) => write!(f, "{}", name),
            ExprKind::Value(v) => match v.as_ref() {
                Value::Type(c) => write!(f, "type({})", c),
                other => write!(f, "{}", other.repr()),
            },
            ExprKind::Unary(u) => write!(f, "{}{}", u.op, Grouped(&u.operand)),
            ExprKind::Binary(b) => write!(f, "{} {} {}", Grouped(&b.lhs), b.op, Grouped(&b.rhs)),
            ExprKind::If(i) => write!(
                f,
                "if {} then {} else {}",
                i.cond, i.then, i.otherwise
            ),
            ExprKind::Let(l) => write!(f, "let {} = {} in {}", l.pattern, l.init, l.body),
            ExprKind::Lambda(lambda) => write!(f, "{}", lambda),
            ExprKind::Call(c) => write!(
                f,
                "{}({})",
                Grouped(&c.callee),
                c.args.iter().join(", ")
            ),
            ExprKind::Object(entries) if entries.is_empty() => write!(f, "{{}}"),
            ExprKind::Object(entries) => write!(
                f,
                "{{ {} }}",
                entries
                    .iter()
                    .map(|e| match e {
                        ObjectEntry::Field { name, value } => format!("{}: {}", name, value),
                        ObjectEntry::Spread(e) => format!("...{}", e),
                    })
                    .join(", ")
            ),
            ExprKind::Array(items) => write!(
                f,
                "[{}]",
                items
                    .iter()
                    .map(|e| match e {
                        ArrayEntry::Item(e) => e.to_string(),
                        ArrayEntry::Spread(e) => format!("...{}", e),
                    })
                    .join(", ")
            ),
            ExprKind::Field(field) => write!(f, "{}.{}", Grouped(&field.object), field.name),
            ExprKind::Index(index) => write!(f, "{}[{}]", Grouped(&index.object), index.index),
            ExprKind::Template(parts) => {
                write!(f, "`")?;
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => write!(f, "{}", text.replace('`', "\\`"))?,
                        TemplatePart::Expr(e) => write!(f, "${{{}}}", e)?,
                    }
                }
                write!(f, "`")
            }
            ExprKind::Block(block) => {
                write!(f, "{{ ")?;
                for item in &block.items {
                    match item {
                        BlockItem::Let(l) => write!(f, "let {} = {}; ", l.pattern, l.init)?,
                        BlockItem::Expr(e) => write!(f, "{}; ", e)?,
                        BlockItem::Import(i) => write!(
                            f,
                            "import {{ {} }} from {}; ",
                            i.names.join(", "),
                            quote(&i.module)
                        )?,
                    }
                }
                write!(f, "{} }}", block.result)
            }
            ExprKind::Await(e) => write!(f, "await {}", Grouped(e)),
            ExprKind::Throw(e) => write!(f, "throw {}", Grouped(e)),
            ExprKind::Match(m) => {
                write!(f, "match {} {{ ", m.scrutinee)?;
                for case in &m.cases {
                    write!(f, "{}", case.pattern)?;
                    if let Some(guard) = &case.guard {
                        write!(f, " if {}", guard)?;
                    }
                    write!(f, " => {}; ", case.body)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl Display for Lambda {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "fn")?;
        if let Some(name) = &self.name {
            write!(f, " {}", name)?;
        }
        let params = self
            .params
            .iter()
            .map(|p| match &p.ty {
                Some(ty) => format!("{}: {}", p.name, ty),
                None => p.name.clone(),
            })
            .join(", ");
        write!(f, "({}) {{ {} }}", params, self.body)
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Pattern::Wildcard => write!(f, "_"),
            Pattern::Binding(name) => write!(f, "{}", name),
            Pattern::Literal(l) => write!(f, "{}", l),
            Pattern::Object(fields) => write!(
                f,
                "{{ {} }}",
                fields
                    .iter()
                    .map(|field| match &field.pattern {
                        Pattern::Binding(name) if *name == field.name => name.clone(),
                        other => format!("{}: {}", field.name, other),
                    })
                    .join(", ")
            ),
            Pattern::Array(array) => {
                let mut parts: Vec<String> = array.items.iter().map(|p| p.to_string()).collect();
                if let Some(rest) = &array.rest {
                    parts.push(format!("...{}", rest));
                }
                write!(f, "[{}]", parts.join(", "))
            }
            Pattern::Type(ty) => match ty.inner.as_ref() {
                Pattern::Wildcard => write!(f, "{}", ty.ty),
                inner => write!(f, "{} as {}", ty.ty, inner),
            },
        }
    }
}

/// Parenthesizes compound operands.
struct Grouped<'a>(&'a Expr);

impl Display for Grouped<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match &self.0.kind {
            ExprKind::Binary(_)
            | ExprKind::Unary(_)
            | ExprKind::If(_)
            | ExprKind::Let(_)
            | ExprKind::Lambda(_)
            | ExprKind::Await(_)
            | ExprKind::Throw(_) => write!(f, "({})", self.0),
            _ => write!(f, "{}", self.0),
        }
    }
}
