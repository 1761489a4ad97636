//! The optimizer's view of the IR and its rewrite engines.
//!
//! The optimizer core decides *what* to do; an [`OptimizerContext`] performs
//! the rewrites. Every transforming method takes `&mut self`, so the borrow
//! checker guarantees at most one transformation is active at a time.

use crate::ir::{FuncId, InstrRef, Module};

/// Result of asking the context to simplify one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Simplified {
    /// Nothing was rewritten.
    Unchanged,
    /// The instruction (or one of its users) was rewritten in place.
    Changed,
    /// The instruction was erased. The position now holds the next
    /// instruction of the block, if any.
    Erased,
}

impl Simplified {
    pub fn changed(&self) -> bool {
        !matches!(self, Simplified::Unchanged)
    }
}

/// IR provider and rewrite engines used by the mandatory optimizer.
pub trait OptimizerContext {
    /// Read access to the module: functions, globals, attributes and bodies.
    fn module(&self) -> &Module;

    /// Materializes the body of `f`. With `recursive`, the bodies of its
    /// statically known callees are materialized too, transitively.
    ///
    /// Returns whether `f` has a body afterwards.
    fn load_body(&mut self, f: FuncId, recursive: bool) -> bool;

    /// Local simplification of the instruction at `at`.
    fn simplify_instruction(&mut self, f: FuncId, at: InstrRef) -> Simplified;

    /// Removes unreachable blocks and merges straight-line block chains.
    fn simplify_cfg(&mut self, f: FuncId) -> bool;

    /// Specializes calls that bind generic parameters of their callee.
    fn specialize_generic_calls(&mut self, f: FuncId, mandatory: bool) -> bool;

    /// Forwards stored values to loads of the same location.
    fn optimize_memory_accesses(&mut self, f: FuncId) -> bool;

    /// Removes allocations that are never read, with their deallocations.
    fn eliminate_dead_allocations(&mut self, f: FuncId) -> bool;

    /// Erases the instruction at `at`.
    fn erase(&mut self, f: FuncId, at: InstrRef);

    /// Rewrites the dynamically dispatched apply at `at` into a direct call.
    fn try_devirtualize(&mut self, f: FuncId, at: InstrRef, mandatory: bool) -> bool;

    /// Inlines the direct apply at `at`. On success the apply is gone and
    /// the instructions following it live in a new block.
    fn inline_call(&mut self, f: FuncId, at: InstrRef, mandatory: bool) -> bool;

    /// Records that a rewrite may have left stack deallocations out of order.
    fn notify_stack_nesting_may_be_invalidated(&mut self);

    /// Restores LIFO order of stack deallocations in `f` if a rewrite
    /// reported it may have broken it. Clears the notification.
    fn fix_stack_nesting_if_invalidated(&mut self, f: FuncId) -> bool;
}
