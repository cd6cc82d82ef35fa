//! Staged values: what the staged evaluator knows about a result.

use crate::engine::Scope;
use derive_more::IsVariant;
use indexmap::IndexMap;
use rf_core::ast::{Expr, Lambda};
use rf_core::{Constraint, Value};
use rf_typing::{constraint_of, simplify};
use std::sync::Arc;

/// The let-name under which a value was emitted once in the residual.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binding {
    pub name: String,
    pub id: u32,
}

/// A function value whose calls are evaluated at each call site.
#[derive(Debug, Clone)]
pub struct StagedClosure {
    pub id: u32,
    pub lambda: Arc<Lambda>,
    pub scope: Scope,
    pub binding: Option<Binding>,
}

#[derive(Debug, Clone, IsVariant)]
pub enum SValue {
    /// Fully known at compile time.
    Now {
        value: Value,
        constraint: Constraint,
        binding: Option<Binding>,
    },
    /// Only known at runtime; `residual` reproduces it.
    Later {
        constraint: Constraint,
        residual: Expr,
    },
    /// Known length, per-element knowledge.
    LaterArray {
        elements: Vec<SValue>,
        binding: Option<Binding>,
    },
    /// Known field names, per-field knowledge.
    LaterObject {
        fields: IndexMap<String, SValue>,
        binding: Option<Binding>,
    },
    Closure(StagedClosure),
}

impl SValue {
    pub fn now(value: Value) -> Self {
        SValue::Now {
            constraint: constraint_of(&value),
            value,
            binding: None,
        }
    }

    pub fn later(constraint: Constraint, residual: Expr) -> Self {
        SValue::Later {
            constraint,
            residual,
        }
    }

    /// `Now` when every element is, `LaterArray` otherwise.
    pub fn array(elements: Vec<SValue>) -> Self {
        match elements
            .iter()
            .map(|e| e.as_value().cloned())
            .collect::<Option<Vec<_>>>()
        {
            Some(values) => SValue::now(Value::Array(values)),
            None => SValue::LaterArray {
                elements,
                binding: None,
            },
        }
    }

    pub fn object(fields: IndexMap<String, SValue>) -> Self {
        match fields
            .iter()
            .map(|(name, f)| Some((name.clone(), f.as_value()?.clone())))
            .collect::<Option<IndexMap<_, _>>>()
        {
            Some(values) => SValue::now(Value::Object(values)),
            None => SValue::LaterObject {
                fields,
                binding: None,
            },
        }
    }

    pub fn constraint(&self) -> Constraint {
        match self {
            SValue::Now { constraint, .. } | SValue::Later { constraint, .. } => constraint.clone(),
            SValue::LaterArray { elements, .. } => {
                simplify(&Constraint::tuple(elements.iter().map(SValue::constraint)))
            }
            SValue::LaterObject { fields, .. } => simplify(&Constraint::record(
                fields.iter().map(|(name, f)| (name.clone(), f.constraint())),
            )),
            SValue::Closure(_) => Constraint::IsFunction,
        }
    }

    /// Known at compile time; closures count.
    pub fn is_known(&self) -> bool {
        matches!(self, SValue::Now { .. } | SValue::Closure(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            SValue::Now { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn as_closure(&self) -> Option<&StagedClosure> {
        match self {
            SValue::Closure(c) => Some(c),
            _ => None,
        }
    }

    pub fn binding(&self) -> Option<&Binding> {
        match self {
            SValue::Now { binding, .. }
            | SValue::LaterArray { binding, .. }
            | SValue::LaterObject { binding, .. } => binding.as_ref(),
            SValue::Closure(c) => c.binding.as_ref(),
            SValue::Later { .. } => None,
        }
    }

    pub fn with_binding(mut self, b: Binding) -> Self {
        match &mut self {
            SValue::Now { binding, .. }
            | SValue::LaterArray { binding, .. }
            | SValue::LaterObject { binding, .. } => *binding = Some(b),
            SValue::Closure(c) => c.binding = Some(b),
            SValue::Later { .. } => {}
        }
        self
    }

    /// Forget binding `id` here and in nested values; used when a value
    /// leaves the scope that emitted it.
    pub fn clear_binding(self, id: u32) -> Self {
        let keep = |b: Option<Binding>| b.filter(|b| b.id != id);
        match self {
            SValue::Now {
                value,
                constraint,
                binding,
            } => SValue::Now {
                value,
                constraint,
                binding: keep(binding),
            },
            SValue::LaterArray { elements, binding } => SValue::LaterArray {
                elements: elements.into_iter().map(|e| e.clear_binding(id)).collect(),
                binding: keep(binding),
            },
            SValue::LaterObject { fields, binding } => SValue::LaterObject {
                fields: fields
                    .into_iter()
                    .map(|(name, f)| (name, f.clear_binding(id)))
                    .collect(),
                binding: keep(binding),
            },
            SValue::Closure(mut c) => {
                c.binding = keep(c.binding);
                SValue::Closure(c)
            }
            later => later,
        }
    }

    /// Replace the constraint of `Now` and `Later` values; the others derive
    /// theirs from their parts.
    pub fn with_constraint(self, c: Constraint) -> Self {
        match self {
            SValue::Now { value, binding, .. } => SValue::Now {
                value,
                constraint: c,
                binding,
            },
            SValue::Later { residual, .. } => SValue::Later {
                constraint: c,
                residual,
            },
            other => other,
        }
    }

    pub fn has_later(&self) -> bool {
        match self {
            SValue::Later { .. } => true,
            SValue::LaterArray { elements, .. } => elements.iter().any(SValue::has_later),
            SValue::LaterObject { fields, .. } => fields.values().any(SValue::has_later),
            SValue::Now { .. } | SValue::Closure(_) => false,
        }
    }
}

/// Apply a refinement to a staged value.
pub fn refine_svalue(value: SValue, refinement: &Constraint) -> SValue {
    match value {
        SValue::Now { .. } | SValue::Later { .. } => {
            let c = simplify(&Constraint::and([value.constraint(), refinement.clone()]));
            value.with_constraint(c)
        }
        other => other,
    }
}
