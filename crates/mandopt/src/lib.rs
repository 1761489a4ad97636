//! mandopt: mandatory whole-module performance optimization.
//!
//! Starting from performance-annotated functions and the initializers of
//! statically initialized globals, this crate discovers every reachable
//! function and drives it to a fixpoint of simplification, inlining,
//! devirtualization, generic specialization and dead-code elimination.

pub mod context;
pub mod ir;
pub mod optimizer;
pub mod transforms;

// Re-export key types for convenience
pub use anyhow::{Context, Result};
pub use context::{OptimizerContext, Simplified};
pub use optimizer::{OptimizerOptions, RunStats};
pub use transforms::ModuleContext;

use ir::Module;

/// Run the mandatory optimization pipeline over `module`.
///
/// This is the main entry point. It borrows the module exclusively for the
/// whole run and rewrites every reachable function in place.
///
/// # Example
/// ```
/// use mandopt::ir::{Function, FunctionBuilder, Module, PerformanceConstraint};
/// use mandopt::{optimize_module, OptimizerOptions};
///
/// let mut b = FunctionBuilder::new();
/// b.constant(42);
/// b.ret(None);
/// let mut f = Function::new("hot");
/// f.performance = PerformanceConstraint::NoAllocation;
/// f.body = Some(b.finish());
///
/// let mut module = Module::new();
/// let id = module.add_function(f);
/// let stats = optimize_module(&mut module, &OptimizerOptions::default()).unwrap();
/// assert_eq!(stats.functions_optimized, 1);
/// assert_eq!(module.function(id).body.as_ref().unwrap().instruction_count(), 0);
/// ```
pub fn optimize_module(module: &mut Module, options: &OptimizerOptions) -> Result<RunStats> {
    let mut ctx = ModuleContext::new(module);
    optimizer::run(&mut ctx, options)
}
