#[macro_use]
pub mod macros;

pub mod ast;
pub mod constraint;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod span;
pub mod value;

// Re-export commonly used items for convenience
pub use tracing;

pub use constraint::{BaseKind, Constraint};
pub use env::Env;
pub use span::Span;
pub use value::{Closure, Value};

pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
