use crate::ast::Lambda;
use crate::constraint::{BaseKind, Constraint};
use crate::env::Env;
use derive_more::IsVariant;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// A fully known value.
#[derive(Clone, Serialize, Deserialize, IsVariant)]
pub enum Value {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Object(IndexMap<String, Value>),
    Array(Vec<Value>),
    #[serde(skip)]
    Closure(Closure),
    Builtin(String),
    Type(Box<Constraint>),
}

/// A lambda paired with the environment it was created in.
#[derive(Clone)]
pub struct Closure {
    pub lambda: Arc<Lambda>,
    pub env: Env<Value>,
}

impl Closure {
    pub fn new(lambda: Arc<Lambda>, env: Env<Value>) -> Self {
        Self { lambda, env }
    }
}

impl Debug for Closure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.lambda.name)
            .field("params", &self.lambda.param_names().collect::<Vec<_>>())
            .field("env", &self.env)
            .finish()
    }
}

impl Value {
    pub fn number(n: impl Into<f64>) -> Self {
        Value::Number(n.into())
    }

    /// The `==` operator: structural, but NaN equals nothing.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.equals(w)))
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            _ => self == other,
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }

    pub fn ty(constraint: Constraint) -> Self {
        Value::Type(Box::new(constraint))
    }

    pub fn kind(&self) -> BaseKind {
        match self {
            Value::Number(_) => BaseKind::Number,
            Value::String(_) => BaseKind::String,
            Value::Bool(_) => BaseKind::Bool,
            Value::Null => BaseKind::Null,
            Value::Object(_) => BaseKind::Object,
            Value::Array(_) => BaseKind::Array,
            Value::Closure(_) | Value::Builtin(_) => BaseKind::Function,
            Value::Type(_) => BaseKind::Type,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&Constraint> {
        match self {
            Value::Type(c) => Some(c),
            _ => None,
        }
    }

    /// Objects, arrays and types: values worth naming once when they recur.
    pub fn is_compound(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_) | Value::Type(_))
    }

    /// Source-like rendering; strings are quoted.
    pub fn repr(&self) -> String {
        match self {
            Value::String(s) => quote(s),
            other => other.to_string(),
        }
    }
}

pub fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

/// Numbers print without a trailing `.0` when integral.
pub fn fmt_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Structural identity: NaN is identical to itself, so `Equals(NaN)` is a
/// well-formed literal constraint. The language's `==` is [`Value::equals`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(&a.lambda, &b.lambda),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Closure(c) => Debug::fmt(c, f),
            Value::Type(c) => write!(f, "Type({})", c),
            other => write!(f, "{}", other.repr()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", fmt_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Object(fields) if fields.is_empty() => write!(f, "{{}}"),
            Value::Object(fields) => write!(
                f,
                "{{ {} }}",
                fields
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.repr()))
                    .join(", ")
            ),
            Value::Array(items) => write!(f, "[{}]", items.iter().map(Value::repr).join(", ")),
            Value::Closure(c) => match &c.lambda.name {
                Some(name) => write!(f, "<fn {}>", name),
                None => write!(f, "<fn>"),
            },
            Value::Builtin(name) => write!(f, "<builtin {}>", name),
            Value::Type(c) => write!(f, "{}", c),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Constraint> for Value {
    fn from(c: Constraint) -> Self {
        Value::Type(Box::new(c))
    }
}
