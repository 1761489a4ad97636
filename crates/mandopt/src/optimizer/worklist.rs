//! FIFO worklist of functions with at-most-once membership.

use crate::ir::{FuncId, Instr, Module};
use std::collections::{HashSet, VecDeque};

/// Functions still to be optimized, in discovery order.
///
/// A function that was ever pushed is never pushed again, even after it has
/// been popped.
#[derive(Debug, Default)]
pub struct FunctionWorklist {
    queue: VecDeque<FuncId>,
    seen: HashSet<FuncId>,
}

impl FunctionWorklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues the roots of the pipeline, in module order: functions with a
    /// performance constraint, and once-initializers of globals that must be
    /// initialized statically.
    pub fn seed(&mut self, module: &Module) {
        for id in module.func_ids() {
            let function = module.function(id);
            let is_root = !function.performance.is_none()
                || (function.global_init_once
                    && function.initialized_global().is_some_and(|g| {
                        module
                            .globals
                            .get(g.as_usize())
                            .is_some_and(|g| g.must_be_initialized_statically)
                    }));
            if is_root {
                self.push(id);
            }
        }
    }

    /// Enqueues `f` unless it was enqueued before. Returns whether it was added.
    pub fn push(&mut self, f: FuncId) -> bool {
        if !self.seen.insert(f) {
            return false;
        }
        self.queue.push_back(f);
        true
    }

    pub fn pop(&mut self) -> Option<FuncId> {
        self.queue.pop_front()
    }

    /// Enqueues every statically known callee of `f` and every function `f`
    /// runs through `Once`. Method calls without a static target are skipped.
    pub fn add_callees_of(&mut self, module: &Module, f: FuncId) {
        let Some(body) = &module.function(f).body else {
            return;
        };
        for (_, instr) in body.instructions() {
            match instr {
                Instr::Apply(apply) => {
                    if let Some(callee) = apply.direct_callee() {
                        self.push(callee);
                    }
                }
                Instr::Once { initializer, .. } => {
                    self.push(*initializer);
                }
                _ => {}
            }
        }
    }

    /// Number of functions waiting to be popped.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, FunctionBuilder, Global, GlobalId, PerformanceConstraint};

    #[test]
    fn push_is_idempotent_and_fifo() {
        let mut wl = FunctionWorklist::new();
        let (a, b, c) = (FuncId::new(0), FuncId::new(1), FuncId::new(2));
        assert!(wl.push(a));
        assert!(wl.push(b));
        assert!(!wl.push(a));
        assert!(wl.push(c));
        assert_eq!(wl.len(), 3);
        assert_eq!(wl.pop(), Some(a));
        // Popped functions stay known.
        assert!(!wl.push(a));
        assert_eq!(wl.pop(), Some(b));
        assert_eq!(wl.pop(), Some(c));
        assert_eq!(wl.pop(), None);
        assert!(wl.is_empty());
    }

    #[test]
    fn seed_selects_annotated_and_static_initializers() {
        let mut module = Module::new();
        let mut static_g = Global::new("S");
        static_g.must_be_initialized_statically = true;
        let s = module.add_global(static_g);
        let d = module.add_global(Global::new("D"));

        let plain = module.add_function(Function::new("plain"));
        let mut annotated = Function::new("annotated");
        annotated.performance = PerformanceConstraint::NoAllocation;
        let annotated = module.add_function(annotated);

        let init_for = |g| {
            let mut b = FunctionBuilder::new();
            b.alloc_global(g);
            b.ret(None);
            let mut f = Function::new("init");
            f.global_init_once = true;
            f.body = Some(b.finish());
            f
        };
        let init_s = module.add_function(init_for(s));
        let init_d = module.add_function(init_for(d));

        let mut wl = FunctionWorklist::new();
        wl.seed(&module);
        assert_eq!(wl.pop(), Some(annotated));
        assert_eq!(wl.pop(), Some(init_s));
        assert_eq!(wl.pop(), None);
        assert!(wl.push(plain));
        assert!(wl.push(init_d));
    }

    #[test]
    fn seed_ignores_initializer_of_unknown_global() {
        let mut module = Module::new();
        let mut b = FunctionBuilder::new();
        b.alloc_global(GlobalId::new(5));
        b.ret(None);
        let mut f = Function::new("init");
        f.global_init_once = true;
        f.body = Some(b.finish());
        module.add_function(f);

        let mut wl = FunctionWorklist::new();
        wl.seed(&module);
        assert!(wl.is_empty());
    }

    #[test]
    fn callees_include_once_initializers_not_methods() {
        let mut module = Module::new();
        let callee = module.add_function(Function::new("callee"));
        let init = module.add_function(Function::new("init"));
        let mut b = FunctionBuilder::new();
        let token = b.param();
        let obj = b.param();
        b.call_void(callee, vec![]);
        b.method_call("m", vec![], obj);
        b.once(token, init);
        b.call_void(callee, vec![]);
        b.ret(None);
        let mut f = Function::new("f");
        f.body = Some(b.finish());
        let f = module.add_function(f);

        let mut wl = FunctionWorklist::new();
        wl.add_callees_of(&module, f);
        assert_eq!(wl.len(), 2);
        assert_eq!(wl.pop(), Some(callee));
        assert_eq!(wl.pop(), Some(init));
    }
}
