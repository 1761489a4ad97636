//! Per-function fixpoint of the mandatory transformations.
//!
//! One round runs, in order:
//!
//! 1. a pass over every instruction: applies go through the inlining policy,
//!    everything else through instruction simplification;
//! 2. stack-nesting repair (when a rewrite reported it) and CFG cleanup;
//! 3. generic specialization;
//! 4. dead-metatype elimination;
//! 5. memory-access optimization;
//! 6. dead-allocation elimination.
//!
//! Rounds repeat until none of them changes the function. There is no round
//! limit: each engine reports a change only when it made progress.

use super::dead_metatypes;
use super::inline_policy::{process_apply, ApplyOutcome, PathFunctionSet};
use crate::context::{OptimizerContext, Simplified};
use crate::ir::{FuncId, InstrRef};
use log::{debug, log_enabled, trace, Level};

/// Counters of one function optimization.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FunctionStats {
    pub rounds: usize,
    pub calls_inlined: usize,
    pub calls_devirtualized: usize,
}

/// Runs the mandatory transformations on one function until nothing changes.
///
/// The `(path, callee)` memo of the global-initializer rule lives as long as
/// the optimizer, so repeated rounds never inline the same callee twice into
/// the same location of the global.
pub struct FunctionOptimizer<'c, C: OptimizerContext> {
    ctx: &'c mut C,
    function: FuncId,
    already_inlined: PathFunctionSet,
    stats: FunctionStats,
}

impl<'c, C: OptimizerContext> FunctionOptimizer<'c, C> {
    pub fn new(ctx: &'c mut C, function: FuncId) -> Self {
        Self {
            ctx,
            function,
            already_inlined: PathFunctionSet::new(),
            stats: FunctionStats::default(),
        }
    }

    pub fn optimize(mut self) -> FunctionStats {
        let f = self.function;
        loop {
            self.stats.rounds += 1;
            let mut changed = self.simplify_and_inline();
            changed |= self.ctx.specialize_generic_calls(f, true);
            changed |= dead_metatypes::eliminate(&mut *self.ctx, f);
            changed |= self.ctx.optimize_memory_accesses(f);
            changed |= self.ctx.eliminate_dead_allocations(f);

            if log_enabled!(Level::Trace) {
                trace!(
                    "after round {}:\n{}",
                    self.stats.rounds,
                    self.ctx.module().function(f)
                );
            }
            if !changed {
                break;
            }
        }
        debug!(
            "{}: fixpoint after {} rounds ({} inlined, {} devirtualized)",
            self.ctx.module().function(f).name,
            self.stats.rounds,
            self.stats.calls_inlined,
            self.stats.calls_devirtualized
        );
        self.stats
    }

    fn simplify_and_inline(&mut self) -> bool {
        let f = self.function;
        let mut changed = false;
        let mut block = 0;
        while block < self.block_count() {
            let mut index = 0;
            while let Some(is_apply) = self.is_apply_at(InstrRef::new(block, index)) {
                let at = InstrRef::new(block, index);
                if is_apply {
                    match process_apply(&mut *self.ctx, f, at, &mut self.already_inlined) {
                        ApplyOutcome::Unchanged => index += 1,
                        ApplyOutcome::Devirtualized => {
                            self.stats.calls_devirtualized += 1;
                            changed = true;
                            index += 1;
                        }
                        ApplyOutcome::Inlined => {
                            // The apply ended its block. The inlined code and
                            // the continuation follow as the next blocks.
                            self.stats.calls_inlined += 1;
                            changed = true;
                            break;
                        }
                    }
                    continue;
                }
                match self.ctx.simplify_instruction(f, at) {
                    Simplified::Unchanged => index += 1,
                    Simplified::Changed => {
                        changed = true;
                        index += 1;
                    }
                    Simplified::Erased => changed = true,
                }
            }
            block += 1;
        }
        changed |= self.ctx.fix_stack_nesting_if_invalidated(f);
        changed |= self.ctx.simplify_cfg(f);
        changed
    }

    fn block_count(&self) -> usize {
        self.ctx
            .module()
            .function(self.function)
            .body
            .as_ref()
            .map_or(0, |body| body.blocks.len())
    }

    /// `None` past the end of the block.
    fn is_apply_at(&self, at: InstrRef) -> Option<bool> {
        let body = self.ctx.module().function(self.function).body.as_ref()?;
        body.get_instr(at).map(|instr| instr.is_full_apply_site())
    }
}
