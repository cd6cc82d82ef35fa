//! Constraints are the types of the language: predicates over values.

use crate::value::{fmt_number, Value};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// The disjoint value kinds, with arrays and functions also being objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BaseKind {
    Number,
    String,
    Bool,
    Null,
    Object,
    Array,
    Function,
    Type,
}

impl BaseKind {
    pub fn constraint(self) -> Constraint {
        match self {
            BaseKind::Number => Constraint::IsNumber,
            BaseKind::String => Constraint::IsString,
            BaseKind::Bool => Constraint::IsBool,
            BaseKind::Null => Constraint::IsNull,
            BaseKind::Object => Constraint::IsObject,
            BaseKind::Array => Constraint::IsArray,
            BaseKind::Function => Constraint::IsFunction,
            BaseKind::Type => Constraint::IsType,
        }
    }

    /// Every value of kind `self` is also of kind `other`.
    pub fn refines(self, other: BaseKind) -> bool {
        self == other
            || (other == BaseKind::Object && matches!(self, BaseKind::Array | BaseKind::Function))
    }

    /// The kind of values belonging to both, if any can.
    pub fn meet(self, other: BaseKind) -> Option<BaseKind> {
        if self.refines(other) {
            Some(self)
        } else if other.refines(self) {
            Some(other)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BaseKind::Number => "number",
            BaseKind::String => "string",
            BaseKind::Bool => "boolean",
            BaseKind::Null => "null",
            BaseKind::Object => "object",
            BaseKind::Array => "array",
            BaseKind::Function => "function",
            BaseKind::Type => "type",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    IsNumber,
    IsString,
    IsBool,
    IsNull,
    IsObject,
    IsArray,
    IsFunction,
    IsType,
    Equals(Value),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    HasField(String, Box<Constraint>),
    Elements(Box<Constraint>),
    Length(Box<Constraint>),
    ElementAt(usize, Box<Constraint>),
    And(Vec<Constraint>),
    Or(Vec<Constraint>),
    Not(Box<Constraint>),
    /// Recursive constraint; `RecVar(0)` in the body refers to the whole.
    Rec(Box<Constraint>),
    /// De Bruijn reference to an enclosing `Rec`.
    RecVar(usize),
    /// Named reference awaiting `Constraint::rec` to close it.
    RecRef(String),
    /// Unification variable of builtin signatures.
    Var(u32),
    Any,
    Never,
}

impl Constraint {
    pub fn equals(value: impl Into<Value>) -> Self {
        Constraint::Equals(value.into())
    }

    pub fn has_field(name: impl Into<String>, c: Constraint) -> Self {
        Constraint::HasField(name.into(), Box::new(c))
    }

    pub fn elements(c: Constraint) -> Self {
        Constraint::Elements(Box::new(c))
    }

    pub fn length(c: Constraint) -> Self {
        Constraint::Length(Box::new(c))
    }

    pub fn element_at(index: usize, c: Constraint) -> Self {
        Constraint::ElementAt(index, Box::new(c))
    }

    pub fn and(items: impl IntoIterator<Item = Constraint>) -> Self {
        Constraint::And(items.into_iter().collect())
    }

    pub fn or(items: impl IntoIterator<Item = Constraint>) -> Self {
        Constraint::Or(items.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(c: Constraint) -> Self {
        Constraint::Not(Box::new(c))
    }

    /// An object with the given field constraints.
    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Constraint)>) -> Self {
        let mut items = vec![Constraint::IsObject];
        items.extend(
            fields
                .into_iter()
                .map(|(name, c)| Constraint::has_field(name, c)),
        );
        Constraint::And(items)
    }

    /// An array of known length with per-index constraints.
    pub fn tuple(items: impl IntoIterator<Item = Constraint>) -> Self {
        let items: Vec<_> = items.into_iter().collect();
        let mut out = vec![
            Constraint::IsArray,
            Constraint::length(Constraint::equals(items.len() as f64)),
        ];
        out.extend(
            items
                .into_iter()
                .enumerate()
                .map(|(i, c)| Constraint::element_at(i, c)),
        );
        Constraint::And(out)
    }

    pub fn array_of(element: Constraint) -> Self {
        Constraint::and([Constraint::IsArray, Constraint::elements(element)])
    }

    /// Close `RecRef(name)` occurrences in `body` into a recursive constraint.
    pub fn rec(name: &str, body: Constraint) -> Self {
        Constraint::Rec(Box::new(close_ref(&body, name, 0)))
    }

    pub fn rec_ref(name: impl Into<String>) -> Self {
        Constraint::RecRef(name.into())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Constraint::Any)
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Constraint::Never)
    }

    pub fn literal(&self) -> Option<&Value> {
        match self {
            Constraint::Equals(v) => Some(v),
            _ => None,
        }
    }

    /// The base kind this single constraint forces, ignoring conjunctions.
    pub fn kind_hint(&self) -> Option<BaseKind> {
        match self {
            Constraint::IsNumber
            | Constraint::Gt(_)
            | Constraint::Gte(_)
            | Constraint::Lt(_)
            | Constraint::Lte(_) => Some(BaseKind::Number),
            Constraint::IsString => Some(BaseKind::String),
            Constraint::IsBool => Some(BaseKind::Bool),
            Constraint::IsNull => Some(BaseKind::Null),
            Constraint::IsObject | Constraint::HasField(..) => Some(BaseKind::Object),
            Constraint::IsArray
            | Constraint::Elements(_)
            | Constraint::Length(_)
            | Constraint::ElementAt(..) => Some(BaseKind::Array),
            Constraint::IsFunction => Some(BaseKind::Function),
            Constraint::IsType => Some(BaseKind::Type),
            Constraint::Equals(v) => Some(v.kind()),
            _ => None,
        }
    }

    pub fn is_base_kind(&self) -> bool {
        matches!(
            self,
            Constraint::IsNumber
                | Constraint::IsString
                | Constraint::IsBool
                | Constraint::IsNull
                | Constraint::IsObject
                | Constraint::IsArray
                | Constraint::IsFunction
                | Constraint::IsType
        )
    }

    pub fn is_numeric_bound(&self) -> bool {
        matches!(
            self,
            Constraint::Gt(_) | Constraint::Gte(_) | Constraint::Lt(_) | Constraint::Lte(_)
        )
    }

    /// Rebuild with `f` applied to every direct child; `Rec` bodies included.
    pub fn map_children(&self, mut f: impl FnMut(&Constraint) -> Constraint) -> Constraint {
        match self {
            Constraint::HasField(name, c) => Constraint::HasField(name.clone(), Box::new(f(c))),
            Constraint::Elements(c) => Constraint::Elements(Box::new(f(c))),
            Constraint::Length(c) => Constraint::Length(Box::new(f(c))),
            Constraint::ElementAt(i, c) => Constraint::ElementAt(*i, Box::new(f(c))),
            Constraint::And(items) => Constraint::And(items.iter().map(&mut f).collect()),
            Constraint::Or(items) => Constraint::Or(items.iter().map(&mut f).collect()),
            Constraint::Not(c) => Constraint::Not(Box::new(f(c))),
            Constraint::Rec(c) => Constraint::Rec(Box::new(f(c))),
            leaf => leaf.clone(),
        }
    }

    pub fn children(&self) -> Vec<&Constraint> {
        match self {
            Constraint::HasField(_, c)
            | Constraint::Elements(c)
            | Constraint::Length(c)
            | Constraint::ElementAt(_, c)
            | Constraint::Not(c)
            | Constraint::Rec(c) => vec![c.as_ref()],
            Constraint::And(items) | Constraint::Or(items) => items.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// True if `pred` holds for this constraint or any descendant.
    pub fn any_node(&self, pred: &mut impl FnMut(&Constraint) -> bool) -> bool {
        pred(self) || self.children().into_iter().any(|c| c.any_node(pred))
    }

    fn rank(&self) -> u8 {
        match self {
            Constraint::Never => 0,
            Constraint::IsNumber => 1,
            Constraint::IsString => 2,
            Constraint::IsBool => 3,
            Constraint::IsNull => 4,
            Constraint::IsObject => 5,
            Constraint::IsArray => 6,
            Constraint::IsFunction => 7,
            Constraint::IsType => 8,
            Constraint::Equals(_) => 9,
            Constraint::Gt(_) | Constraint::Gte(_) => 10,
            Constraint::Lt(_) | Constraint::Lte(_) => 11,
            Constraint::Length(_) => 12,
            Constraint::Elements(_) => 13,
            Constraint::ElementAt(..) => 14,
            Constraint::HasField(..) => 15,
            Constraint::Rec(_) => 16,
            Constraint::RecVar(_) | Constraint::RecRef(_) | Constraint::Var(_) => 17,
            Constraint::Not(_) => 18,
            Constraint::And(_) => 19,
            Constraint::Or(_) => 20,
            Constraint::Any => 21,
        }
    }

    /// Total order used to sort conjuncts and disjuncts into canonical form.
    pub fn canonical_cmp(&self, other: &Constraint) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| match (self, other) {
                (Constraint::ElementAt(a, _), Constraint::ElementAt(b, _)) => a.cmp(b),
                _ => Ordering::Equal,
            })
            .then_with(|| self.to_string().cmp(&other.to_string()))
    }

    fn write(&self, f: &mut Formatter<'_>, depth: usize) -> std::fmt::Result {
        match self {
            Constraint::Equals(v) => write!(f, "{}", v.repr()),
            Constraint::Gt(n) => write!(f, "> {}", fmt_number(*n)),
            Constraint::Gte(n) => write!(f, ">= {}", fmt_number(*n)),
            Constraint::Lt(n) => write!(f, "< {}", fmt_number(*n)),
            Constraint::Lte(n) => write!(f, "<= {}", fmt_number(*n)),
            Constraint::HasField(name, c) => {
                write!(f, "{{ {}: ", name)?;
                c.write(f, depth)?;
                write!(f, " }}")
            }
            Constraint::Elements(c) => {
                write!(f, "Array<")?;
                c.write(f, depth)?;
                write!(f, ">")
            }
            Constraint::Length(c) => {
                write!(f, "length(")?;
                c.write(f, depth)?;
                write!(f, ")")
            }
            Constraint::ElementAt(i, c) => {
                write!(f, "[{}]: ", i)?;
                c.write_grouped(f, depth)
            }
            Constraint::And(items) => write_joined(f, items, " & ", depth),
            Constraint::Or(items) => write_joined(f, items, " | ", depth),
            Constraint::Not(c) => {
                write!(f, "!")?;
                c.write_grouped(f, depth)
            }
            Constraint::Rec(body) => {
                write!(f, "rec T{}. ", depth)?;
                body.write(f, depth + 1)
            }
            Constraint::RecVar(i) if *i < depth => write!(f, "T{}", depth - 1 - i),
            Constraint::RecVar(i) => write!(f, "^{}", i),
            Constraint::RecRef(name) => write!(f, "{}", name),
            Constraint::Var(id) => write!(f, "?{}", id),
            Constraint::Any => write!(f, "any"),
            Constraint::Never => write!(f, "never"),
            kind => match kind.kind_hint() {
                Some(k) => write!(f, "{}", k.name()),
                None => write!(f, "?"),
            },
        }
    }

    fn write_grouped(&self, f: &mut Formatter<'_>, depth: usize) -> std::fmt::Result {
        if matches!(self, Constraint::And(_) | Constraint::Or(_) | Constraint::Rec(_)) {
            write!(f, "(")?;
            self.write(f, depth)?;
            write!(f, ")")
        } else {
            self.write(f, depth)
        }
    }
}

fn write_joined(
    f: &mut Formatter<'_>,
    items: &[Constraint],
    sep: &str,
    depth: usize,
) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        item.write_grouped(f, depth)?;
    }
    Ok(())
}

fn close_ref(c: &Constraint, name: &str, depth: usize) -> Constraint {
    match c {
        Constraint::RecRef(n) if n == name => Constraint::RecVar(depth),
        Constraint::Rec(body) => Constraint::Rec(Box::new(close_ref(body, name, depth + 1))),
        other => other.map_children(|child| close_ref(child, name, depth)),
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.write(f, 0)
    }
}

/// Render a list of constraints, for messages.
pub fn describe(items: &[Constraint]) -> String {
    items.iter().map(|c| c.to_string()).join(", ")
}
