//! Mandatory performance optimization driver.
//!
//! Walks every function reachable from the pipeline roots (functions with a
//! performance constraint and initializers of statically initialized
//! globals) and runs the per-function fixpoint on each of them.
//!
//! ## Driver loop
//!
//! 1. Seed the worklist with the roots, in module order.
//! 2. Pop a function. If its body (and transitively its callees' bodies)
//!    cannot be loaded, skip it.
//! 3. Run [`FunctionOptimizer`] until nothing changes.
//! 4. Optionally verify the result.
//! 5. Push every callee the optimized body still references.
//!
//! Each function is optimized at most once per run.

mod dead_metatypes;
pub mod function;
pub mod global_init;
pub mod inline_policy;
pub mod worklist;

pub use function::{FunctionOptimizer, FunctionStats};
pub use worklist::FunctionWorklist;

use crate::context::OptimizerContext;
use crate::ir::verify::verify_function;
use anyhow::{Context, Result};
use log::{debug, info};

/// Options for one optimizer run.
#[derive(Debug, Clone)]
pub struct OptimizerOptions {
    /// Run the IR verifier on each function after optimizing it.
    pub verify: bool,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self { verify: true }
    }
}

/// Counters of one optimizer run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub functions_optimized: usize,
    /// Functions reached by the walk whose body was not available.
    pub functions_skipped: usize,
    pub calls_inlined: usize,
    pub calls_devirtualized: usize,
    pub fixpoint_rounds: usize,
}

impl RunStats {
    fn record(&mut self, function: FunctionStats) {
        self.functions_optimized += 1;
        self.calls_inlined += function.calls_inlined;
        self.calls_devirtualized += function.calls_devirtualized;
        self.fixpoint_rounds += function.rounds;
    }
}

/// Runs the mandatory optimizations over the module behind `ctx`.
///
/// Fails only when verification is enabled and an optimized function is
/// malformed. Functions optimized before the failure keep their rewrites.
pub fn run<C: OptimizerContext>(ctx: &mut C, options: &OptimizerOptions) -> Result<RunStats> {
    let mut worklist = FunctionWorklist::new();
    worklist.seed(ctx.module());
    debug!("{} root functions", worklist.len());

    let mut stats = RunStats::default();
    while let Some(f) = worklist.pop() {
        let Some(name) = ctx.module().functions.get(f.as_usize()).map(|func| func.name.clone())
        else {
            debug!("skipping {f}: not in module");
            stats.functions_skipped += 1;
            continue;
        };
        if !ctx.load_body(f, true) {
            debug!("skipping {name}: body not available");
            stats.functions_skipped += 1;
            continue;
        }

        debug!("optimizing {name}");
        let function_stats = FunctionOptimizer::new(&mut *ctx, f).optimize();
        stats.record(function_stats);

        if options.verify {
            verify_function(ctx.module(), f)
                .with_context(|| format!("malformed IR after optimizing {name}"))?;
        }
        worklist.add_callees_of(ctx.module(), f);
    }

    info!(
        "optimized {} functions ({} skipped): {} calls inlined, {} devirtualized, {} rounds",
        stats.functions_optimized,
        stats.functions_skipped,
        stats.calls_inlined,
        stats.calls_devirtualized,
        stats.fixpoint_rounds
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FuncId, Function, FunctionBuilder, Instr, InstrRef, Module, PerformanceConstraint};
    use crate::transforms::ModuleContext;

    fn root(name: &str, body: crate::ir::Body) -> Function {
        let mut f = Function::new(name);
        f.performance = PerformanceConstraint::NoAllocation;
        f.body = Some(body);
        f
    }

    #[test]
    fn unreachable_functions_are_untouched() {
        let mut module = Module::new();
        let mut b = FunctionBuilder::new();
        let x = b.param();
        b.constant(1);
        b.debug_value(x);
        b.ret(None);
        let body = b.finish();
        let mut plain = Function::new("plain");
        plain.body = Some(body.clone());
        let plain = module.add_function(plain);
        let annotated = module.add_function(root("annotated", body));

        let stats = run(&mut ModuleContext::new(&mut module), &OptimizerOptions::default()).unwrap();
        assert_eq!(stats.functions_optimized, 1);
        let count = |f: FuncId| module.function(f).body.as_ref().unwrap().instruction_count();
        assert_eq!(count(plain), 2);
        assert_eq!(count(annotated), 1);
    }

    #[test]
    fn callees_are_optimized_once_and_external_ones_skipped() {
        let mut module = Module::new();
        let external = module.add_function(Function::new("puts"));

        let mut b = FunctionBuilder::new();
        let one = b.constant(1);
        let two = b.constant(2);
        b.binop(crate::ir::BinOp::Add, one, two);
        b.call_void(external, vec![]);
        b.ret(None);
        let mut helper = Function::new("helper");
        helper.body = Some(b.finish());
        let helper = module.add_function(helper);

        let mut b = FunctionBuilder::new();
        b.call_void(helper, vec![]);
        b.call_void(helper, vec![]);
        b.ret(None);
        module.add_function(root("entry", b.finish()));

        let stats = run(&mut ModuleContext::new(&mut module), &OptimizerOptions::default()).unwrap();
        assert_eq!(stats.functions_optimized, 2);
        assert_eq!(stats.functions_skipped, 1);
        assert_eq!(stats.calls_inlined, 0);
        // The unused arithmetic in the callee was cleaned up.
        let body = module.function(helper).body.as_ref().unwrap();
        assert_eq!(body.instruction_count(), 1);
        assert!(body.instr(InstrRef::new(0, 0)).is_full_apply_site());
    }

    #[test]
    fn verifier_failure_is_reported() {
        let mut module = Module::new();
        let mut b = FunctionBuilder::new();
        let x = b.param();
        b.debug_value(x);
        b.ret(None);
        let mut body = b.finish();
        // Use of a value nothing defines.
        body.blocks[0].instructions.push(Instr::DebugValue {
            operand: crate::ir::VarId(body.next_var + 7),
        });
        module.add_function(root("broken", body));

        let err = run(&mut ModuleContext::new(&mut module), &OptimizerOptions::default()).unwrap_err();
        assert!(format!("{err:#}").contains("broken"));

        let stats = run(
            &mut ModuleContext::new(&mut module),
            &OptimizerOptions { verify: false },
        )
        .unwrap();
        assert_eq!(stats.functions_optimized, 1);
    }
}
