//! Refine staged evaluation
//!
//! This crate splits every expression of a core program into what is known at
//! compile time and what has to run later, and carries a direct interpreter
//! sharing the same operator semantics.

pub mod builtins;
pub mod engine;
pub mod error;
pub mod imports;
pub mod interpreter;
pub mod operators;
pub mod options;
pub mod refine;
pub mod svalue;

use rf_core::ast::Expr;
use rf_core::{Result, Value};
use std::sync::Arc;

pub use builtins::{Builtin, BuiltinRegistry};
pub use engine::{Scope, StageOutcome, StagingOrchestrator};
pub use imports::{ImportTable, ImportedBinding};
pub use interpreter::Interpreter;
pub use options::StageOptions;
pub use refine::RefinementContext;
pub use svalue::{Binding, SValue, StagedClosure};

/// Stage `expr` with the standard builtins and default options.
pub fn stage(expr: &Expr) -> Result<StageOutcome> {
    StagingOrchestrator::new(Arc::new(BuiltinRegistry::standard())).stage(expr)
}

/// Evaluate `expr` directly with the standard builtins.
pub fn run(expr: &Expr) -> Result<Value> {
    Interpreter::new(Arc::new(BuiltinRegistry::standard())).run(expr)
}
