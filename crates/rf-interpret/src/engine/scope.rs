use crate::refine::{RefinementContext, Refinements};
use crate::svalue::{refine_svalue, Binding, SValue};
use rf_core::Env;

/// Lexical state of the staged evaluator: staged values by name, the
/// refinements valid here, and the residual names in scope.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    env: Env<SValue>,
    refinements: RefinementContext,
    residual: Env<u32>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a source name; any refinement of the old binding is dropped.
    pub fn bind(&self, name: &str, value: SValue) -> Self {
        Self {
            env: self.env.bind(name, value),
            refinements: self.refinements.without(name),
            residual: self.residual.clone(),
        }
    }

    /// Record that residual code binds `name` here.
    pub fn bind_residual(&self, name: &str, id: u32) -> Self {
        Self {
            env: self.env.clone(),
            refinements: self.refinements.clone(),
            residual: self.residual.bind(name, id),
        }
    }

    /// The value of `name` with its refinement applied.
    pub fn get(&self, name: &str) -> Option<SValue> {
        let value = self.env.lookup(name)?.clone();
        Some(match self.refinements.get(name) {
            Some(refinement) => refine_svalue(value, refinement),
            None => value,
        })
    }

    /// This scope's values seen from `site`: residual names are those of `site`.
    pub fn with_residual_of(&self, site: &Scope) -> Self {
        Self {
            env: self.env.clone(),
            refinements: self.refinements.clone(),
            residual: site.residual.clone(),
        }
    }

    pub fn raw(&self, name: &str) -> Option<&SValue> {
        self.env.lookup(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.env.contains(name)
    }

    pub fn refine(&self, refinements: &Refinements) -> Self {
        Self {
            env: self.env.clone(),
            refinements: self.refinements.refine_all(refinements),
            residual: self.residual.clone(),
        }
    }

    pub fn refinements(&self) -> &RefinementContext {
        &self.refinements
    }

    /// The residual name of `binding` refers to that binding here.
    pub fn is_visible(&self, binding: &Binding) -> bool {
        self.residual.lookup(&binding.name) == Some(&binding.id)
    }

    pub fn has_residual_name(&self, name: &str) -> bool {
        self.residual.contains(name)
    }
}
