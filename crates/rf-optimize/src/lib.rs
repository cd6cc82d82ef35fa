// rf-optimize: static analyses over the core AST used by the staged evaluator
//
// - passes::comptime_params: which parameters reach a compile-time position
// - passes::usage: free variables, use counts and residual purity

pub mod passes;

pub use passes::*;
