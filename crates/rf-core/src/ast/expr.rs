use crate::ast::{BinOpKind, Pattern, UnOpKind};
use crate::span::Span;
use crate::value::Value;
use std::sync::Arc;

pub type BExpr = Box<Expr>;

common_enum! {
    pub enum Literal {
        Number(f64),
        String(String),
        Bool(bool),
        Null,
    }
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }

    pub fn from_value(value: &Value) -> Option<Literal> {
        match value {
            Value::Number(n) => Some(Literal::Number(*n)),
            Value::String(s) => Some(Literal::String(s.clone())),
            Value::Bool(b) => Some(Literal::Bool(*b)),
            Value::Null => Some(Literal::Null),
            _ => None,
        }
    }
}

common_enum! {
    pub enum ExprKind {
        Literal(Literal),
        Var(String),
        /// An already evaluated value spliced into the tree (types in residual code)
        Value(Box<Value>),
        Unary(ExprUnary),
        Binary(ExprBinary),
        If(ExprIf),
        Let(ExprLet),
        Lambda(Arc<Lambda>),
        Call(ExprCall),
        Object(Vec<ObjectEntry>),
        Array(Vec<ArrayEntry>),
        Field(ExprField),
        Index(ExprIndex),
        Template(Vec<TemplatePart>),
        Block(ExprBlock),
        Await(BExpr),
        Throw(BExpr),
        Match(ExprMatch),
    }
}

common_struct! {
    pub struct Expr {
        #[serde(flatten)]
        pub kind: ExprKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub span: Option<Span>,
    }
}

common_struct! {
    pub struct ExprUnary {
        pub op: UnOpKind,
        pub operand: BExpr,
    }
}

common_struct! {
    pub struct ExprBinary {
        pub op: BinOpKind,
        pub lhs: BExpr,
        pub rhs: BExpr,
    }
}

common_struct! {
    pub struct ExprIf {
        pub cond: BExpr,
        pub then: BExpr,
        pub otherwise: BExpr,
    }
}

common_struct! {
    pub struct ExprLet {
        pub pattern: Pattern,
        pub init: BExpr,
        pub body: BExpr,
    }
}

common_struct! {
    pub struct Param {
        pub name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub ty: Option<Expr>,
    }
}

common_struct! {
    /// A function literal; `name` makes it visible to its own body for recursion.
    pub struct Lambda {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        pub params: Vec<Param>,
        pub body: Expr,
    }
}

impl Lambda {
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

common_struct! {
    pub struct ExprCall {
        pub callee: BExpr,
        pub args: Vec<Expr>,
    }
}

common_enum! {
    pub enum ObjectEntry {
        Field { name: String, value: Expr },
        Spread(Expr),
    }
}

common_enum! {
    pub enum ArrayEntry {
        Item(Expr),
        Spread(Expr),
    }
}

common_struct! {
    pub struct ExprField {
        pub object: BExpr,
        pub name: String,
    }
}

common_struct! {
    pub struct ExprIndex {
        pub object: BExpr,
        pub index: BExpr,
    }
}

common_enum! {
    pub enum TemplatePart {
        Text(String),
        Expr(Expr),
    }
}

common_struct! {
    pub struct StmtLet {
        pub pattern: Pattern,
        pub init: Expr,
    }
}

common_struct! {
    pub struct StmtImport {
        pub names: Vec<String>,
        pub module: String,
    }
}

common_enum! {
    pub enum BlockItem {
        Let(StmtLet),
        Expr(Expr),
        Import(StmtImport),
    }
}

common_struct! {
    pub struct ExprBlock {
        pub items: Vec<BlockItem>,
        pub result: BExpr,
    }
}

common_struct! {
    pub struct MatchCase {
        pub pattern: Pattern,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub guard: Option<Expr>,
        pub body: Expr,
    }
}

common_struct! {
    pub struct ExprMatch {
        pub scrutinee: BExpr,
        pub cases: Vec<MatchCase>,
    }
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self { kind, span: None }
    }

    pub fn with_span(mut self, span: Option<Span>) -> Self {
        self.span = span.or(self.span);
        self
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Var(name.into()))
    }

    pub fn literal(literal: Literal) -> Self {
        Self::new(ExprKind::Literal(literal))
    }

    pub fn lambda(lambda: Lambda) -> Self {
        Self::new(ExprKind::Lambda(Arc::new(lambda)))
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call(ExprCall {
            callee: Box::new(callee),
            args,
        }))
    }

    pub fn let_in(pattern: Pattern, init: Expr, body: Expr) -> Self {
        Self::new(ExprKind::Let(ExprLet {
            pattern,
            init: Box::new(init),
            body: Box::new(body),
        }))
    }

    pub fn field(object: Expr, name: impl Into<String>) -> Self {
        Self::new(ExprKind::Field(ExprField {
            object: Box::new(object),
            name: name.into(),
        }))
    }

    /// Literal syntax for a known value; `None` for closures.
    pub fn from_value(value: &Value) -> Option<Expr> {
        let kind = match value {
            Value::Object(fields) => ExprKind::Object(
                fields
                    .iter()
                    .map(|(name, v)| {
                        Some(ObjectEntry::Field {
                            name: name.clone(),
                            value: Expr::from_value(v)?,
                        })
                    })
                    .collect::<Option<_>>()?,
            ),
            Value::Array(items) => ExprKind::Array(
                items
                    .iter()
                    .map(|v| Expr::from_value(v).map(ArrayEntry::Item))
                    .collect::<Option<_>>()?,
            ),
            Value::Builtin(name) => ExprKind::Var(name.clone()),
            Value::Type(_) => ExprKind::Value(Box::new(value.clone())),
            Value::Closure(_) => return None,
            primitive => ExprKind::Literal(Literal::from_value(primitive)?),
        };
        Some(Expr::new(kind))
    }

    pub fn as_var(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Var(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.kind {
            ExprKind::Literal(l) => Some(l),
            _ => None,
        }
    }
}

impl From<ExprKind> for Expr {
    fn from(kind: ExprKind) -> Self {
        Expr::new(kind)
    }
}
