//! The constraint algebra: implication, simplification, unification and narrowing.

pub mod check;
pub mod derive;
pub mod implies;
pub mod interval;
pub mod project;
pub mod rec;
pub mod simplify;
pub mod solver;
pub mod unify;

pub use check::satisfies;
pub use derive::constraint_of;
pub use implies::implies;
pub use interval::Interval;
pub use project::{element_at_constraint, element_constraint, field_constraint, length_constraint};
pub use simplify::simplify;
pub use solver::Bindings;
pub use unify::{disjoint, exclude, narrow_or, unify};
