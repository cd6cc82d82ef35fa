//! Module bindings available to `import` items.

use indexmap::IndexMap;
use rf_core::{Constraint, Result, Value};
use serde::{Deserialize, Serialize};

/// What an imported name stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportedBinding {
    /// Known at compile time.
    Value(Value),
    /// Only its constraint is known; the value arrives at runtime.
    Declared(Constraint),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportTable {
    modules: IndexMap<String, IndexMap<String, ImportedBinding>>,
}

impl ImportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn insert(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        binding: ImportedBinding,
    ) -> &mut Self {
        self.modules
            .entry(module.into())
            .or_default()
            .insert(name.into(), binding);
        self
    }

    pub fn resolve(&self, module: &str, name: &str) -> Option<&ImportedBinding> {
        self.modules.get(module)?.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
