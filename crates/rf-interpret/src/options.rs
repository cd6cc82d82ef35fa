use serde::{Deserialize, Serialize};

/// Limits and switches of a staging pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageOptions {
    /// Nested compile-time calls allowed before staging gives up.
    pub max_call_depth: usize,
    /// Specialized definitions allowed per function.
    pub max_specializations: usize,
    /// Report branches whose refinement is contradictory.
    pub warn_unreachable: bool,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 64,
            max_specializations: 64,
            warn_unreachable: true,
        }
    }
}
