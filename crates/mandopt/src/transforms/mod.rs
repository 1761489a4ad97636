//! Rewrite engines over an in-memory [`Module`].
//!
//! [`ModuleContext`] implements [`OptimizerContext`] by dispatching to one
//! self-contained sub-module per engine. Each engine works on a single
//! function body and reports whether it changed anything.

use crate::context::{OptimizerContext, Simplified};
use crate::ir::{Body, FuncId, InstrRef, Module};
use log::trace;
use std::collections::HashMap;

// ── Engines ──────────────────────────────────────────────────────────────────
pub mod cfg;
pub mod dead_alloc;
pub mod devirtualize;
pub mod inline;
pub mod loader;
pub mod memory;
pub mod simplify;
pub mod specialize;
pub mod stack_nesting;

/// Maps a generic callee and its substitutions to the specialized clone.
pub type SpecializationMemo = HashMap<(FuncId, Vec<String>), FuncId>;

/// [`OptimizerContext`] over a mutably borrowed module.
pub struct ModuleContext<'a> {
    module: &'a mut Module,
    specializations: SpecializationMemo,
    stack_nesting_invalidated: bool,
}

impl<'a> ModuleContext<'a> {
    pub fn new(module: &'a mut Module) -> Self {
        Self {
            module,
            specializations: HashMap::new(),
            stack_nesting_invalidated: false,
        }
    }

    fn body_mut(&mut self, f: FuncId) -> Option<&mut Body> {
        self.module.functions.get_mut(f.as_usize())?.body.as_mut()
    }
}

impl OptimizerContext for ModuleContext<'_> {
    fn module(&self) -> &Module {
        &*self.module
    }

    fn load_body(&mut self, f: FuncId, recursive: bool) -> bool {
        loader::load(self.module, f, recursive)
    }

    fn simplify_instruction(&mut self, f: FuncId, at: InstrRef) -> Simplified {
        match self.body_mut(f) {
            Some(body) => simplify::simplify_instruction(body, at),
            None => Simplified::Unchanged,
        }
    }

    fn simplify_cfg(&mut self, f: FuncId) -> bool {
        self.body_mut(f).is_some_and(cfg::simplify)
    }

    fn specialize_generic_calls(&mut self, f: FuncId, mandatory: bool) -> bool {
        specialize::specialize_calls(self.module, &mut self.specializations, f, mandatory)
    }

    fn optimize_memory_accesses(&mut self, f: FuncId) -> bool {
        self.body_mut(f).is_some_and(memory::forward_stored_values)
    }

    fn eliminate_dead_allocations(&mut self, f: FuncId) -> bool {
        self.body_mut(f).is_some_and(dead_alloc::eliminate)
    }

    fn erase(&mut self, f: FuncId, at: InstrRef) {
        let Some(block) = self
            .body_mut(f)
            .and_then(|body| body.blocks.get_mut(at.block))
        else {
            return;
        };
        if at.index < block.instructions.len() {
            let erased = block.instructions.remove(at.index);
            trace!("{f}: erased `{erased}`");
        }
    }

    fn try_devirtualize(&mut self, f: FuncId, at: InstrRef, mandatory: bool) -> bool {
        devirtualize::devirtualize(self.module, f, at, mandatory)
    }

    fn inline_call(&mut self, f: FuncId, at: InstrRef, mandatory: bool) -> bool {
        inline::inline_call(self.module, f, at, mandatory)
    }

    fn notify_stack_nesting_may_be_invalidated(&mut self) {
        self.stack_nesting_invalidated = true;
    }

    fn fix_stack_nesting_if_invalidated(&mut self, f: FuncId) -> bool {
        if !std::mem::take(&mut self.stack_nesting_invalidated) {
            return false;
        }
        self.body_mut(f).is_some_and(stack_nesting::fix)
    }
}
