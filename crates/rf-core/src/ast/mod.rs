//! Core AST consumed by the evaluators and produced as residual output.

pub mod build;
mod expr;
mod ops;
mod pattern;
mod pretty;
pub mod visit;

pub use expr::*;
pub use ops::*;
pub use pattern::*;
