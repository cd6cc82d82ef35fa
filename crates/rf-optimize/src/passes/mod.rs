// Passes - stateless or memoized analyses over expressions

pub mod comptime_params;
pub mod usage;

pub use comptime_params::*;
pub use usage::*;
